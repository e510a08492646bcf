//! Message bus abstraction between the orchestrator and its peers.
//!
//! The orchestrator never owns sockets. It talks to a [`NetworkManager`]:
//! named point-to-point connections with fire-and-forget sends and a
//! callback-based receive path. Production deployments put a real transport
//! behind the trait; the bundled [`InProcessNetwork`] runs everything in one
//! process for tests and simulation.

mod inprocess;

pub use inprocess::InProcessNetwork;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Receive callback invoked with each inbound message payload.
///
/// Callbacks run on network-owned threads, possibly several at a time, and
/// must not panic out into the transport.
pub type NetworkCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Named-connection message bus.
///
/// All operations are safe to call from any thread.
pub trait NetworkManager: Send + Sync {
    /// Send a payload to the named connection, waiting at most `timeout`.
    fn send_to(&self, connection: &str, bytes: &[u8], timeout: Duration)
        -> Result<(), NetworkError>;

    /// Open the named connection for receiving.
    fn start_listening(&self, connection: &str) -> Result<(), NetworkError>;

    /// Close the named connection and release its resources.
    fn stop_listening(&self, connection: &str) -> Result<(), NetworkError>;

    /// Install the receive callback for a listening connection.
    fn register_callback(
        &self,
        connection: &str,
        callback: NetworkCallback,
    ) -> Result<(), NetworkError>;

    /// Remove the receive callback, if any.
    ///
    /// An invocation already in flight may still complete after this
    /// returns; the callback handle stays alive until it does.
    fn clear_callback(&self, connection: &str) -> Result<(), NetworkError>;
}

/// Errors surfaced by [`NetworkManager`] implementations.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// A send attempt did not go through.
    #[error("send to connection \"{connection}\" failed: {reason}")]
    SendFailed {
        /// Destination connection name.
        connection: String,
        /// Transport-specific failure description.
        reason: String,
    },

    /// The named connection does not exist.
    #[error("unknown connection \"{0}\"")]
    UnknownConnection(String),

    /// `start_listening` on a connection that is already open.
    #[error("connection \"{0}\" is already listening")]
    AlreadyListening(String),

    /// Operation requires a listening connection.
    #[error("connection \"{0}\" is not listening")]
    NotListening(String),
}
