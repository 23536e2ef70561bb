//! Listener failure reporting.

use crate::error::BoxError;
use crate::events::ListenerId;
use std::any::Any;
use std::fmt;
use tracing::error;

/// Why a listener failed to handle an event.
#[derive(Debug)]
pub enum ListenerFailure {
    /// The handler returned an error.
    Error(BoxError),
    /// The handler panicked; holds the panic message.
    Panic(String),
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "handler returned error: {}", err),
            Self::Panic(msg) => write!(f, "handler panicked: {}", msg),
        }
    }
}

/// Where a listener failure happened.
pub struct FailureContext<'a> {
    /// Identifier of the bus that dispatched the event
    pub bus: &'a str,
    /// Type name of the event
    pub event_type: &'static str,
    /// The failing listener
    pub listener: ListenerId,
    /// Type name of the failing listener
    pub listener_type: &'static str,
    /// The event being dispatched
    pub event: &'a (dyn Any + Send + Sync),
}

impl fmt::Debug for FailureContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureContext")
            .field("bus", &self.bus)
            .field("event_type", &self.event_type)
            .field("listener", &self.listener)
            .field("listener_type", &self.listener_type)
            .finish_non_exhaustive()
    }
}

/// Receives listener failures caught by the bus.
///
/// Called synchronously on the posting thread, right after the failing
/// handler and before the next listener runs.
pub trait ExceptionHandler: Send + Sync {
    /// Report one failure.
    fn handle_failure(&self, failure: &ListenerFailure, context: &FailureContext<'_>);
}

/// Default handler: logs every failure at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExceptionHandler;

impl ExceptionHandler for LoggingExceptionHandler {
    fn handle_failure(&self, failure: &ListenerFailure, context: &FailureContext<'_>) {
        error!(
            bus = context.bus,
            event = context.event_type,
            listener = context.listener_type,
            error = %failure,
            "Event listener failed"
        );
    }
}
