//! In-process loopback implementation of the network manager.
//!
//! Each listening connection gets an unbounded channel and a delivery thread
//! that hands payloads to the registered callback. This reproduces the
//! threading model of a real transport - callbacks run on network-owned
//! threads, concurrently across connections - without any sockets, which is
//! what the CLI simulation and the integration tests need.
//!
//! Send faults can be injected per connection to exercise the retry and
//! quarantine paths.

use super::{NetworkCallback, NetworkError, NetworkManager};
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Callback slot shared between the handle and the delivery thread.
type CallbackSlot = Arc<Mutex<Option<NetworkCallback>>>;

struct Endpoint {
    sender: Sender<Vec<u8>>,
    callback: CallbackSlot,
    delivery_thread: Option<JoinHandle<()>>,
}

/// Loopback message bus connecting components inside one process.
pub struct InProcessNetwork {
    endpoints: Mutex<HashMap<String, Endpoint>>,
    /// Per-connection count of sends to fail before delivering again.
    faults: Mutex<HashMap<String, usize>>,
}

impl InProcessNetwork {
    /// Create an empty bus with no connections.
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next `count` sends to `connection` fail.
    ///
    /// Pass `usize::MAX` to fail sends until [`clear_send_faults`] is called.
    ///
    /// [`clear_send_faults`]: InProcessNetwork::clear_send_faults
    pub fn fail_next_sends(&self, connection: &str, count: usize) {
        self.faults
            .lock()
            .unwrap()
            .insert(connection.to_string(), count);
    }

    /// Remove any injected fault for `connection`.
    pub fn clear_send_faults(&self, connection: &str) {
        self.faults.lock().unwrap().remove(connection);
    }

    fn take_fault(&self, connection: &str) -> bool {
        let mut faults = self.faults.lock().unwrap();
        match faults.get_mut(connection) {
            Some(0) | None => false,
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                true
            }
        }
    }
}

impl Default for InProcessNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkManager for InProcessNetwork {
    fn send_to(
        &self,
        connection: &str,
        bytes: &[u8],
        _timeout: Duration,
    ) -> Result<(), NetworkError> {
        if self.take_fault(connection) {
            return Err(NetworkError::SendFailed {
                connection: connection.to_string(),
                reason: "injected fault".to_string(),
            });
        }

        let endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints
            .get(connection)
            .ok_or_else(|| NetworkError::UnknownConnection(connection.to_string()))?;
        endpoint
            .sender
            .send(bytes.to_vec())
            .map_err(|_| NetworkError::SendFailed {
                connection: connection.to_string(),
                reason: "delivery channel closed".to_string(),
            })
    }

    fn start_listening(&self, connection: &str) -> Result<(), NetworkError> {
        let mut endpoints = self.endpoints.lock().unwrap();
        if endpoints.contains_key(connection) {
            return Err(NetworkError::AlreadyListening(connection.to_string()));
        }

        let (sender, receiver) = mpsc::channel::<Vec<u8>>();
        let callback: CallbackSlot = Arc::new(Mutex::new(None));
        let thread_callback = Arc::clone(&callback);
        let thread_name = format!("net-{connection}");

        let delivery_thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                while let Ok(payload) = receiver.recv() {
                    // Clone the handle out so the slot is not locked while
                    // the callback runs.
                    let handler = thread_callback.lock().unwrap().clone();
                    match handler {
                        Some(handler) => handler(&payload),
                        None => debug!("message dropped, no callback registered"),
                    }
                }
            })
            .map_err(|e| NetworkError::SendFailed {
                connection: connection.to_string(),
                reason: format!("failed to spawn delivery thread: {e}"),
            })?;

        endpoints.insert(
            connection.to_string(),
            Endpoint {
                sender,
                callback,
                delivery_thread: Some(delivery_thread),
            },
        );
        debug!(connection, "listening");
        Ok(())
    }

    fn stop_listening(&self, connection: &str) -> Result<(), NetworkError> {
        let mut endpoint = {
            let mut endpoints = self.endpoints.lock().unwrap();
            endpoints
                .remove(connection)
                .ok_or_else(|| NetworkError::NotListening(connection.to_string()))?
        };

        // Dropping the sender ends the delivery loop; join outside the map
        // lock so in-flight callbacks can finish.
        drop(endpoint.sender);
        if let Some(handle) = endpoint.delivery_thread.take() {
            let _ = handle.join();
        }
        debug!(connection, "stopped listening");
        Ok(())
    }

    fn register_callback(
        &self,
        connection: &str,
        callback: NetworkCallback,
    ) -> Result<(), NetworkError> {
        let endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints
            .get(connection)
            .ok_or_else(|| NetworkError::NotListening(connection.to_string()))?;
        *endpoint.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn clear_callback(&self, connection: &str) -> Result<(), NetworkError> {
        let endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints
            .get(connection)
            .ok_or_else(|| NetworkError::NotListening(connection.to_string()))?;
        *endpoint.callback.lock().unwrap() = None;
        Ok(())
    }
}

impl Drop for InProcessNetwork {
    fn drop(&mut self) {
        let mut endpoints = self.endpoints.lock().unwrap();
        for (_, endpoint) in endpoints.iter_mut() {
            let Endpoint {
                sender,
                delivery_thread,
                ..
            } = endpoint;
            // Replace the sender with a dead one so the receiver disconnects.
            let (dead, _) = mpsc::channel();
            *sender = dead;
            if let Some(handle) = delivery_thread.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_send_delivers_to_callback() {
        let network = InProcessNetwork::new();
        network.start_listening("ep").unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        network
            .register_callback(
                "ep",
                Arc::new(move |bytes: &[u8]| {
                    sink.lock().unwrap().push(bytes.to_vec());
                }),
            )
            .unwrap();

        network
            .send_to("ep", &[1, 2, 3], Duration::from_millis(10))
            .unwrap();

        // Delivery is asynchronous; poll briefly.
        for _ in 0..100 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(received.lock().unwrap().as_slice(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn test_send_to_unknown_connection_fails() {
        let network = InProcessNetwork::new();
        let result = network.send_to("nowhere", &[0], Duration::from_millis(10));
        assert!(matches!(result, Err(NetworkError::UnknownConnection(_))));
    }

    #[test]
    fn test_double_listen_rejected() {
        let network = InProcessNetwork::new();
        network.start_listening("ep").unwrap();
        let result = network.start_listening("ep");
        assert!(matches!(result, Err(NetworkError::AlreadyListening(_))));
    }

    #[test]
    fn test_stop_listening_removes_endpoint() {
        let network = InProcessNetwork::new();
        network.start_listening("ep").unwrap();
        network.stop_listening("ep").unwrap();

        let result = network.send_to("ep", &[0], Duration::from_millis(10));
        assert!(matches!(result, Err(NetworkError::UnknownConnection(_))));
        assert!(matches!(
            network.stop_listening("ep"),
            Err(NetworkError::NotListening(_))
        ));
    }

    #[test]
    fn test_cleared_callback_drops_messages() {
        let network = InProcessNetwork::new();
        network.start_listening("ep").unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        network
            .register_callback(
                "ep",
                Arc::new(move |_: &[u8]| {
                    counter.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .unwrap();
        network.clear_callback("ep").unwrap();

        network.send_to("ep", &[0], Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_injected_faults_fail_then_recover() {
        let network = InProcessNetwork::new();
        network.start_listening("ep").unwrap();
        network.fail_next_sends("ep", 2);

        for _ in 0..2 {
            let result = network.send_to("ep", &[0], Duration::from_millis(10));
            assert!(matches!(result, Err(NetworkError::SendFailed { .. })));
        }
        assert!(network.send_to("ep", &[0], Duration::from_millis(10)).is_ok());
    }
}
