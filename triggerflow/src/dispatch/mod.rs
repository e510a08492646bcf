//! The dispatch loop and its collaborators.
//!
//! [`Dispatcher`] is the long-running worker thread: it pops trigger
//! decisions off the input queue, selects a destination via the worker
//! table, sends over the network with retries, and records the assignment.
//! [`TokenHandler`] is its asynchronous counterpart, invoked from network
//! threads for every completion token. The two meet at the [`SlotSignal`]
//! condition variable: each completion frees a slot and wakes a dispatcher
//! blocked on backpressure.

mod dispatcher;
mod signal;
mod token;

pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::DispatchContext;
pub use signal::SlotSignal;
pub use token::TokenHandler;
