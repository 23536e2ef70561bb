//! Event notification bus.
//!
//! Listeners subscribe to concrete event types; publishers post events without
//! knowing who receives them. Dispatch is synchronous and isolates listener
//! failures from the publisher and from each other.

mod builtin;
mod bus;
mod failure;
mod listener;

pub use builtin::{ConfigurationChanged, DeadEvent};
pub use bus::{DispatchReport, EventBus, EventBusBuilder, Subscription};
pub use failure::{ExceptionHandler, FailureContext, ListenerFailure, LoggingExceptionHandler};
pub use listener::{Event, Handler, HandlerResult, Listener, ListenerId, Registrar};
