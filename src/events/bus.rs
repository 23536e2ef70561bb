//! Synchronous, failure-isolating event bus.

use crate::error::panic_message;
use crate::events::builtin::DeadEvent;
use crate::events::failure::{
    ExceptionHandler, FailureContext, ListenerFailure, LoggingExceptionHandler,
};
use crate::events::listener::{FnListener, Registrar, Registration};
use crate::events::{Event, HandlerResult, Listener, ListenerId};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

#[cfg(feature = "metrics")]
use crate::metrics::ConfigMetrics;

/// Registered listeners per event type, in registration order.
type Registry = HashMap<TypeId, Arc<[Registration]>>;

/// Outcome of a single [`EventBus::post`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that handled the event successfully
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
    /// Whether the event had no listener and was re-posted as a `DeadEvent`
    pub dead: bool,
}

struct BusInner {
    identifier: String,
    /// Copy-on-write registry: `post` reads it lock-free
    registry: ArcSwap<Registry>,
    /// Serializes registry writers
    write_lock: Mutex<()>,
    exception_handler: Arc<dyn ExceptionHandler>,
    dead_events: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl BusInner {
    fn add(&self, registrations: Vec<Registration>) {
        let _guard = self.write_lock.lock();
        let mut next: Registry = (**self.registry.load()).clone();

        for registration in registrations {
            let slot = next
                .entry(registration.event_type)
                .or_insert_with(|| Arc::from(Vec::new()));
            if slot.iter().any(|r| r.listener == registration.listener) {
                continue;
            }
            debug!(
                bus = %self.identifier,
                event = registration.event_name,
                listener = registration.handler.listener_type(),
                "Registering listener"
            );
            let mut listeners = slot.to_vec();
            listeners.push(registration);
            *slot = Arc::from(listeners);
        }

        self.install(next);
    }

    fn remove(&self, listener: ListenerId) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.registry.load_full();
        if !current
            .values()
            .any(|slot| slot.iter().any(|r| r.listener == listener))
        {
            return false;
        }

        let next: Registry = current
            .iter()
            .filter_map(|(event_type, slot)| {
                let kept: Vec<Registration> = slot
                    .iter()
                    .filter(|r| r.listener != listener)
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| (*event_type, Arc::from(kept)))
            })
            .collect();

        debug!(bus = %self.identifier, ?listener, "Unregistered listener");
        self.install(next);
        true
    }

    fn install(&self, next: Registry) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.update_listener_count(distinct_listeners(&next) as i64);
        }
        self.registry.store(Arc::new(next));
    }

    fn listeners_for(&self, event_type: TypeId) -> Option<Arc<[Registration]>> {
        self.registry
            .load()
            .get(&event_type)
            .filter(|slot| !slot.is_empty())
            .cloned()
    }

    fn report(&self, failure: ListenerFailure, context: FailureContext<'_>) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_listener_failure();
        }

        let handled = catch_unwind(AssertUnwindSafe(|| {
            self.exception_handler.handle_failure(&failure, &context)
        }));
        if let Err(payload) = handled {
            error!(
                bus = %self.identifier,
                event = context.event_type,
                listener = context.listener_type,
                original = %failure,
                panic = %panic_message(payload.as_ref()),
                "Exception handler panicked"
            );
        }
    }
}

fn distinct_listeners(registry: &Registry) -> usize {
    registry
        .values()
        .flat_map(|slot| slot.iter().map(|r| r.listener))
        .collect::<HashSet<_>>()
        .len()
}

/// Decoupled publish/subscribe channel.
///
/// `post` runs every listener registered for the event's exact type,
/// synchronously on the calling thread, in registration order. A listener that
/// returns an error or panics is reported to the configured
/// [`ExceptionHandler`] and the remaining listeners still run.
///
/// The registry is copy-on-write: each `post` dispatches to the listener set
/// that was current when it started, so listeners may register or unregister
/// (even from inside a handler) without blocking or disturbing in-flight posts.
///
/// Cloning an `EventBus` yields another handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use tiered_config::events::EventBus;
///
/// struct ConfigReloaded(u64);
///
/// let bus = EventBus::new();
/// let subscription = bus.subscribe(|event: &ConfigReloaded| {
///     println!("reloaded to version {}", event.0);
///     Ok(())
/// });
///
/// assert_eq!(bus.post(ConfigReloaded(2)).delivered, 1);
///
/// drop(subscription);
/// assert_eq!(bus.post(ConfigReloaded(3)).delivered, 0);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus named `"default"` that logs listener failures.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for a customized bus.
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// The identifier given at construction, used in logs and failure contexts.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// Register every handler `listener` declares.
    ///
    /// Registering the same listener again does not duplicate delivery.
    pub fn register<L: Listener>(&self, listener: &Arc<L>) -> ListenerId {
        let mut registrar = Registrar::new(Arc::clone(listener));
        L::subscriptions(&mut registrar);
        self.inner.add(registrar.into_registrations());
        ListenerId::of(listener)
    }

    /// Remove every registration of `listener`.
    ///
    /// Returns whether anything was removed; unregistering a listener that
    /// is not registered is a no-op.
    pub fn unregister<L: ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.inner.remove(ListenerId::of(listener))
    }

    /// Remove every registration of the listener with the given id.
    pub fn unregister_id(&self, listener: ListenerId) -> bool {
        self.inner.remove(listener)
    }

    /// Register a closure for events of type `E`.
    ///
    /// The closure stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        let listener = Arc::new(FnListener::<E, F>::new(handler));
        let mut registrar = Registrar::new(Arc::clone(&listener));
        registrar.on::<E>();
        self.inner.add(registrar.into_registrations());

        Subscription {
            id: ListenerId::of(&listener),
            bus: Arc::downgrade(&self.inner),
            _listener: listener,
        }
    }

    /// Deliver `event` to every listener registered for its type.
    ///
    /// Never fails because of a listener: failures are counted in the report
    /// and handed to the exception handler.
    pub fn post<E: Event>(&self, event: E) -> DispatchReport {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_event_posted();
        }

        self.dispatch(event)
    }

    fn dispatch<E: Event>(&self, event: E) -> DispatchReport {
        let Some(listeners) = self.inner.listeners_for(TypeId::of::<E>()) else {
            return self.post_dead(event);
        };

        let mut report = DispatchReport::default();
        for registration in listeners.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                registration.handler.dispatch(&event as &dyn Any)
            }));

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(ListenerFailure::Error(err)),
                Err(payload) => Some(ListenerFailure::Panic(panic_message(payload.as_ref()))),
            };

            match failure {
                None => report.delivered += 1,
                Some(failure) => {
                    report.failed += 1;
                    self.inner.report(
                        failure,
                        FailureContext {
                            bus: &self.inner.identifier,
                            event_type: registration.event_name,
                            listener: registration.listener,
                            listener_type: registration.handler.listener_type(),
                            event: &event,
                        },
                    );
                }
            }
        }
        report
    }

    fn post_dead<E: Event>(&self, event: E) -> DispatchReport {
        if !self.inner.dead_events || TypeId::of::<E>() == TypeId::of::<DeadEvent>() {
            debug!(
                bus = %self.inner.identifier,
                event = type_name::<E>(),
                "Dropping event without listeners"
            );
            return DispatchReport::default();
        }

        debug!(
            bus = %self.inner.identifier,
            event = type_name::<E>(),
            "No listeners, posting dead event"
        );
        let report = self.dispatch(DeadEvent::new(event));
        DispatchReport {
            dead: true,
            ..report
        }
    }

    /// Whether the listener with the given id has at least one registration.
    pub fn is_registered(&self, listener: ListenerId) -> bool {
        self.inner
            .registry
            .load()
            .values()
            .any(|slot| slot.iter().any(|r| r.listener == listener))
    }

    /// Whether any listener is registered for events of type `E`.
    pub fn has_listeners<E: Event>(&self) -> bool {
        self.inner.listeners_for(TypeId::of::<E>()).is_some()
    }

    /// Number of distinct registered listeners.
    pub fn listener_count(&self) -> usize {
        distinct_listeners(&self.inner.registry.load())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("identifier", &self.inner.identifier)
            .field("listeners", &self.listener_count())
            .field("dead_events", &self.inner.dead_events)
            .finish()
    }
}

/// Handle for a closure registered with [`EventBus::subscribe`].
///
/// When the handle is dropped, the closure is unregistered.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    id: ListenerId,
    bus: Weak<BusInner>,
    // Keeps the allocation alive so the id cannot be reused while subscribed
    _listener: Arc<dyn Any + Send + Sync>,
}

impl Subscription {
    /// Identity of the subscribed closure.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}

/// Builder for an [`EventBus`].
///
/// # Examples
///
/// ```rust
/// use tiered_config::events::{EventBus, LoggingExceptionHandler};
///
/// let bus = EventBus::builder()
///     .with_identifier("config-events")
///     .with_exception_handler(LoggingExceptionHandler)
///     .with_dead_events(false)
///     .build();
///
/// assert_eq!(bus.identifier(), "config-events");
/// ```
pub struct EventBusBuilder {
    identifier: String,
    exception_handler: Arc<dyn ExceptionHandler>,
    dead_events: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<ConfigMetrics>,
}

impl EventBusBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            identifier: "default".to_string(),
            exception_handler: Arc::new(LoggingExceptionHandler),
            dead_events: true,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Name the bus.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Replace the default logging exception handler.
    pub fn with_exception_handler<H: ExceptionHandler + 'static>(mut self, handler: H) -> Self {
        self.exception_handler = Arc::new(handler);
        self
    }

    /// Enable or disable re-posting undelivered events as `DeadEvent`.
    pub fn with_dead_events(mut self, enabled: bool) -> Self {
        self.dead_events = enabled;
        self
    }

    /// Record bus activity in the given metrics collector.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ConfigMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the bus.
    pub fn build(self) -> EventBus {
        EventBus {
            inner: Arc::new(BusInner {
                identifier: self.identifier,
                registry: ArcSwap::from_pointee(Registry::new()),
                write_lock: Mutex::new(()),
                exception_handler: self.exception_handler,
                dead_events: self.dead_events,
                #[cfg(feature = "metrics")]
                metrics: self.metrics,
            }),
        }
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
