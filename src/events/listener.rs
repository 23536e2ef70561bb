//! Listener capability contract.
//!
//! A listener states the event types it accepts by implementing [`Handler<E>`]
//! once per event type and listing those types in [`Listener::subscriptions`].
//! Nothing is discovered at runtime.

use crate::error::BoxError;
use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

/// Any value that can travel over the bus.
///
/// Dispatch is keyed on the event's concrete type only.
pub trait Event: Any + Send + Sync {}

impl<T: Any + Send + Sync> Event for T {}

/// Outcome of one handler invocation.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Handles events of type `E`.
pub trait Handler<E: Event>: Send + Sync {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// An error is reported to the bus's exception handler; it never reaches
    /// the poster or other listeners.
    fn handle(&self, event: &E) -> HandlerResult;
}

/// A listener that declares its handled event types.
///
/// # Examples
///
/// ```rust
/// use tiered_config::events::{EventBus, Handler, HandlerResult, Listener, Registrar};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Ping;
/// struct Pong;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl Handler<Ping> for Counter {
///     fn handle(&self, _: &Ping) -> HandlerResult {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Handler<Pong> for Counter {
///     fn handle(&self, _: &Pong) -> HandlerResult {
///         self.0.fetch_add(10, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Listener for Counter {
///     fn subscriptions(registrar: &mut Registrar<Self>) {
///         registrar.on::<Ping>().on::<Pong>();
///     }
/// }
///
/// let bus = EventBus::new();
/// let counter = Arc::new(Counter::default());
/// bus.register(&counter);
///
/// bus.post(Ping);
/// bus.post(Pong);
/// assert_eq!(counter.0.load(Ordering::SeqCst), 11);
/// ```
pub trait Listener: Send + Sync + Sized + 'static {
    /// List the event types this listener handles.
    fn subscriptions(registrar: &mut Registrar<Self>);
}

/// Identity of a registered listener.
///
/// Derived from the address of the listener's `Arc` allocation, so every
/// clone of the same `Arc` maps to the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(usize);

impl ListenerId {
    /// Identity of the listener behind `listener`.
    pub fn of<L: ?Sized>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }
}

/// Type-erased handler stored in the registry.
pub(crate) trait ErasedHandler: Send + Sync {
    fn dispatch(&self, event: &dyn Any) -> HandlerResult;

    fn listener_type(&self) -> &'static str;
}

struct TypedHandler<L, E> {
    listener: Arc<L>,
    _event: PhantomData<fn(&E)>,
}

impl<L, E> ErasedHandler for TypedHandler<L, E>
where
    L: Handler<E> + 'static,
    E: Event,
{
    fn dispatch(&self, event: &dyn Any) -> HandlerResult {
        match event.downcast_ref::<E>() {
            Some(event) => self.listener.handle(event),
            None => Ok(()),
        }
    }

    fn listener_type(&self) -> &'static str {
        type_name::<L>()
    }
}

/// One (event type, listener) pair.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) event_type: TypeId,
    pub(crate) event_name: &'static str,
    pub(crate) listener: ListenerId,
    pub(crate) handler: Arc<dyn ErasedHandler>,
}

/// Collects the event types a [`Listener`] subscribes to.
pub struct Registrar<L> {
    listener: Arc<L>,
    registrations: Vec<Registration>,
}

impl<L: Send + Sync + 'static> Registrar<L> {
    pub(crate) fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            registrations: Vec::new(),
        }
    }

    /// Subscribe the listener to events of type `E`.
    ///
    /// Declaring the same type twice has no additional effect.
    pub fn on<E: Event>(&mut self) -> &mut Self
    where
        L: Handler<E>,
    {
        let event_type = TypeId::of::<E>();
        if !self
            .registrations
            .iter()
            .any(|r| r.event_type == event_type)
        {
            self.registrations.push(Registration {
                event_type,
                event_name: type_name::<E>(),
                listener: ListenerId::of(&self.listener),
                handler: Arc::new(TypedHandler::<L, E> {
                    listener: Arc::clone(&self.listener),
                    _event: PhantomData,
                }),
            });
        }
        self
    }

    pub(crate) fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }
}

/// Adapter that lets a closure act as a single-type listener.
pub(crate) struct FnListener<E, F> {
    handler: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F> {
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            _event: PhantomData,
        }
    }
}

impl<E, F> Handler<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &E) -> HandlerResult {
        (self.handler)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Pong;

    struct Both;

    impl Handler<Ping> for Both {
        fn handle(&self, _: &Ping) -> HandlerResult {
            Ok(())
        }
    }

    impl Handler<Pong> for Both {
        fn handle(&self, _: &Pong) -> HandlerResult {
            Err("pong rejected".into())
        }
    }

    #[test]
    fn test_listener_id_follows_allocation() {
        let a = Arc::new(Both);
        let a2 = Arc::clone(&a);
        let b = Arc::new(Both);

        assert_eq!(ListenerId::of(&a), ListenerId::of(&a2));
        assert_ne!(ListenerId::of(&a), ListenerId::of(&b));
    }

    #[test]
    fn test_registrar_deduplicates_types() {
        let listener = Arc::new(Both);
        let mut registrar = Registrar::new(Arc::clone(&listener));
        registrar.on::<Ping>().on::<Pong>().on::<Ping>();

        let registrations = registrar.into_registrations();
        assert_eq!(registrations.len(), 2);
        assert!(registrations.iter().all(|r| r.listener == ListenerId::of(&listener)));
    }

    #[test]
    fn test_erased_dispatch() {
        let mut registrar = Registrar::new(Arc::new(Both));
        registrar.on::<Ping>().on::<Pong>();
        let registrations = registrar.into_registrations();

        let ping = &registrations[0];
        assert!(ping.handler.dispatch(&Ping).is_ok());
        assert!(ping.handler.listener_type().ends_with("Both"));

        let pong = &registrations[1];
        assert!(pong.handler.dispatch(&Pong).is_err());
        // A mismatched payload is ignored
        assert!(pong.handler.dispatch(&Ping).is_ok());
    }

    #[test]
    fn test_fn_listener() {
        let listener = FnListener::<Ping, _>::new(|_: &Ping| -> HandlerResult { Err("no".into()) });
        assert!(listener.handle(&Ping).is_err());
    }
}
