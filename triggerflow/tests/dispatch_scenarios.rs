//! End-to-end dispatch scenarios against the in-process network.
//!
//! Each test wires a real orchestrator to simulated worker endpoints:
//! decisions flow out through the bus and are recorded per worker, tokens
//! are injected back through the token connection exactly as a TRB would
//! send them.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use triggerflow::config::{OrchestratorConfig, TrbConnection};
use triggerflow::messages::{CompletionToken, RunNumber, TriggerDecision, TriggerNumber};
use triggerflow::network::{InProcessNetwork, NetworkManager};
use triggerflow::orchestrator::DataFlowOrchestrator;
use triggerflow::queue::DecisionQueue;

const TOKEN_CONNECTION: &str = "toward_dfo";
const RUN: RunNumber = 7;

struct Harness {
    network: Arc<InProcessNetwork>,
    queue: Arc<DecisionQueue>,
    dfo: DataFlowOrchestrator,
    /// `(worker, trigger_number)` in global send order.
    send_log: Arc<Mutex<Vec<(String, TriggerNumber)>>>,
}

impl Harness {
    /// Configure and start an orchestrator over `workers`, with recording
    /// endpoints already listening for each of them.
    fn start(workers: &[(&str, usize)], send_retries: usize) -> Self {
        let network = Arc::new(InProcessNetwork::new());
        let queue = Arc::new(DecisionQueue::new(256));
        let send_log = Arc::new(Mutex::new(Vec::new()));

        for (name, _) in workers {
            network.start_listening(name).unwrap();
            let log = Arc::clone(&send_log);
            let worker_name = name.to_string();
            network
                .register_callback(
                    name,
                    Arc::new(move |bytes: &[u8]| {
                        let decision = TriggerDecision::from_bytes(bytes).unwrap();
                        log.lock()
                            .unwrap()
                            .push((worker_name.clone(), decision.trigger_number));
                    }),
                )
                .unwrap();
        }

        let mut dfo =
            DataFlowOrchestrator::new(Arc::clone(&network) as Arc<dyn NetworkManager>, Arc::clone(&queue));
        dfo.configure(OrchestratorConfig {
            dataflow_applications: workers
                .iter()
                .map(|(name, capacity)| TrbConnection {
                    decision_connection: name.to_string(),
                    capacity: *capacity,
                })
                .collect(),
            general_queue_timeout: Duration::from_millis(10),
            token_connection: TOKEN_CONNECTION.to_string(),
            td_send_retries: send_retries,
        })
        .unwrap();
        dfo.start(RUN).unwrap();

        Self {
            network,
            queue,
            dfo,
            send_log,
        }
    }

    fn push(&self, trigger: TriggerNumber) {
        self.queue
            .push(TriggerDecision::new(trigger, RUN), Duration::from_millis(500))
            .unwrap();
    }

    fn inject_token(&self, worker: &str, trigger: TriggerNumber, run: RunNumber) {
        let bytes = CompletionToken {
            run_number: run,
            trigger_number: trigger,
            decision_destination: worker.to_string(),
        }
        .to_bytes()
        .unwrap();
        self.network
            .send_to(TOKEN_CONNECTION, &bytes, Duration::from_millis(10))
            .unwrap();
    }

    fn sends(&self) -> Vec<(String, TriggerNumber)> {
        self.send_log.lock().unwrap().clone()
    }

    fn wait_for_sends(&self, count: usize) {
        wait_until(|| self.send_log.lock().unwrap().len() >= count);
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Basic rotation: four decisions across two workers alternate a, b, a, b
/// and fill both to capacity.
#[test]
fn scenario_basic_rotation() {
    let mut harness = Harness::start(&[("a", 2), ("b", 2)], 3);
    // Step decision by decision so the recorded order is the send order
    // even though each endpoint logs from its own delivery thread.
    for trigger in 1..=4 {
        harness.push(trigger);
        harness.wait_for_sends(trigger as usize);
    }
    assert_eq!(
        harness.sends(),
        [
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("a".to_string(), 3),
            ("b".to_string(), 4),
        ]
    );

    let table = harness.dfo.table().unwrap();
    for name in ["a", "b"] {
        let worker = table.get(name).unwrap();
        wait_until(|| worker.outstanding_len() == 2);
        assert!(worker.is_busy());
    }

    harness.dfo.stop().unwrap();
}

/// Backpressure: with every slot taken the fifth decision stays pending
/// until a completion token frees a slot, then goes to the freed worker.
#[test]
fn scenario_backpressure_wakes_on_token() {
    let mut harness = Harness::start(&[("a", 2), ("b", 2)], 3);
    for trigger in 1..=4 {
        harness.push(trigger);
    }
    harness.wait_for_sends(4);

    harness.push(5);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.sends().len(), 4, "decision 5 must wait for a slot");

    harness.inject_token("b", 2, RUN);
    harness.wait_for_sends(5);
    assert_eq!(harness.sends()[4], ("b".to_string(), 5));

    let table = harness.dfo.table().unwrap();
    let worker_b = table.get("b").unwrap();
    wait_until(|| worker_b.outstanding_len() == 2);
    assert!(worker_b.get_assignment(2).is_none());
    assert!(worker_b.get_assignment(5).is_some());

    harness.dfo.stop().unwrap();
}

/// Retry then quarantine: exhausted sends mark the worker in error and the
/// decision is re-routed; a later token from the worker clears the flag.
#[test]
fn scenario_retry_quarantine_reconnect() {
    let mut harness = Harness::start(&[("a", 2), ("b", 4)], 3);

    // One healthy assignment on "a" so a real completion can come back
    // from it later.
    harness.push(1);
    harness.wait_for_sends(1);
    assert_eq!(harness.sends()[0], ("a".to_string(), 1));

    harness.network.fail_next_sends("a", usize::MAX);

    // Goes to "b" by rotation.
    harness.push(2);
    harness.wait_for_sends(2);
    assert_eq!(harness.sends()[1], ("b".to_string(), 2));

    // Rotation picks "a" again: three failed attempts, quarantine, and the
    // decision lands on "b" instead.
    harness.push(3);
    harness.wait_for_sends(3);
    assert_eq!(harness.sends()[2], ("b".to_string(), 3));

    let table = harness.dfo.table().unwrap();
    let worker_a = table.get("a").unwrap();
    let worker_b = table.get("b").unwrap();
    assert!(worker_a.is_in_error());
    assert_eq!(worker_a.outstanding_len(), 1);
    assert_eq!(worker_b.outstanding_len(), 2);

    // Completion of the earlier assignment doubles as reconnection.
    harness.network.clear_send_faults("a");
    harness.inject_token("a", 1, RUN);
    wait_until(|| !worker_a.is_in_error());
    assert_eq!(worker_a.outstanding_len(), 0);

    harness.dfo.stop().unwrap();
}

/// A token from a previous run is counted but changes nothing.
#[test]
fn scenario_stale_run_token() {
    let mut harness = Harness::start(&[("a", 2)], 3);
    harness.push(1);
    harness.wait_for_sends(1);

    let table = harness.dfo.table().unwrap();
    let worker = table.get("a").unwrap();
    wait_until(|| worker.outstanding_len() == 1);

    harness.inject_token("a", 1, RUN - 1);
    thread::sleep(Duration::from_millis(50));

    assert_eq!(worker.outstanding_len(), 1, "stale token must not complete");
    let snapshot = harness.dfo.metrics_snapshot();
    assert_eq!(snapshot.tokens_received, 1);

    harness.dfo.stop().unwrap();
}

/// A token for an unknown trigger warns and leaves quarantine untouched.
#[test]
fn scenario_unknown_trigger_token() {
    let mut harness = Harness::start(&[("a", 4)], 3);
    harness.push(1);
    harness.wait_for_sends(1);

    let table = harness.dfo.table().unwrap();
    let worker = table.get("a").unwrap();
    wait_until(|| worker.outstanding_len() == 1);
    worker.set_in_error(true);

    harness.inject_token("a", 999, RUN);
    thread::sleep(Duration::from_millis(50));

    assert!(worker.is_in_error(), "unknown trigger must not clear quarantine");
    assert_eq!(worker.outstanding_len(), 1);
    assert_eq!(harness.dfo.metrics_snapshot().tokens_received, 1);

    harness.dfo.stop().unwrap();
}

/// Decisions queued at stop still go out through the shutdown drain.
#[test]
fn scenario_stop_drains_queue() {
    let mut harness = Harness::start(&[("a", 1)], 3);

    // Fill the single slot, then queue more than fits.
    harness.push(1);
    harness.wait_for_sends(1);
    for trigger in 2..=3 {
        harness.push(trigger);
    }

    // Free the slot so the drain can route the leftovers, and make sure
    // the token lands before stop clears the callback.
    harness.inject_token("a", 1, RUN);
    {
        let table = harness.dfo.table().unwrap();
        let worker = table.get("a").unwrap();
        wait_until(|| worker.get_assignment(1).is_none());
    }
    harness.dfo.stop().unwrap();

    wait_until(|| harness.queue.is_empty());
    assert!(harness.sends().len() >= 2);
}

/// Metrics snapshot reports and zeroes the dispatch counters.
#[test]
fn scenario_metrics_snapshot() {
    let mut harness = Harness::start(&[("a", 4)], 3);
    for trigger in 1..=3 {
        harness.push(trigger);
    }
    harness.wait_for_sends(3);
    harness.inject_token("a", 1, RUN);

    let table = harness.dfo.table().unwrap();
    wait_until(|| table.get("a").unwrap().outstanding_len() == 2);

    let snapshot = harness.dfo.metrics_snapshot();
    assert_eq!(snapshot.decisions_received, 3);
    assert_eq!(snapshot.decisions_sent, 3);
    assert_eq!(snapshot.tokens_received, 1);

    // Drained on read.
    let second = harness.dfo.metrics_snapshot();
    assert_eq!(second.decisions_sent, 0);

    harness.dfo.stop().unwrap();
}
