//! Simulated TRB worker pool for exercising the orchestrator end to end.
//!
//! Each configured worker gets an endpoint on the in-process bus whose
//! callback plays trigger record builder: decode the decision, pretend to
//! build a record for a while, then send the completion token back to the
//! orchestrator's token connection. A producer thread feeds the decision
//! queue at a fixed rate. Dispatch statistics are logged once per second.

use crate::error::CliError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use triggerflow::config::OrchestratorConfig;
use triggerflow::messages::{CompletionToken, RunNumber, TriggerDecision};
use triggerflow::network::{InProcessNetwork, NetworkManager};
use triggerflow::orchestrator::DataFlowOrchestrator;
use triggerflow::queue::DecisionQueue;

/// Decisions the input queue can buffer before the producer blocks.
const QUEUE_CAPACITY: usize = 1024;

/// Run number used for the simulated run.
const SIM_RUN_NUMBER: RunNumber = 1;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Run the orchestrator against simulated workers for `duration`.
///
/// # Arguments
///
/// * `config` - Worker topology and timeouts, as in production
/// * `duration` - Wall-clock length of the simulated run
/// * `rate` - Decisions produced per second
/// * `build_time` - Simulated record-building time per decision
pub fn run_simulation(
    config: &OrchestratorConfig,
    duration: Duration,
    rate: u64,
    build_time: Duration,
) -> Result<(), CliError> {
    let network = Arc::new(InProcessNetwork::new());
    let queue = Arc::new(DecisionQueue::new(QUEUE_CAPACITY));

    spawn_workers(&network, config, build_time)?;

    let mut dfo = DataFlowOrchestrator::new(
        Arc::clone(&network) as Arc<dyn NetworkManager>,
        Arc::clone(&queue),
    );
    dfo.configure(config.clone())?;
    dfo.start(SIM_RUN_NUMBER)?;

    let producing = Arc::new(AtomicBool::new(true));
    let producer = spawn_producer(Arc::clone(&queue), rate, Arc::clone(&producing));

    let started = Instant::now();
    while started.elapsed() < duration {
        thread::sleep(REPORT_INTERVAL.min(duration));
        let snapshot = dfo.metrics_snapshot();
        info!(
            decisions_received = snapshot.decisions_received,
            decisions_sent = snapshot.decisions_sent,
            tokens_received = snapshot.tokens_received,
            waiting_for_slots_us = snapshot.waiting_for_slots_us,
            waiting_for_decision_us = snapshot.waiting_for_decision_us,
            deciding_destination_us = snapshot.deciding_destination_us,
            "dispatch statistics"
        );
    }

    producing.store(false, Ordering::Relaxed);
    if producer.join().is_err() {
        warn!("producer thread panicked");
    }

    dfo.stop()?;

    for app in &config.dataflow_applications {
        let outstanding = dfo
            .table()
            .and_then(|table| table.get(&app.decision_connection))
            .map(|worker| worker.outstanding_len())
            .unwrap_or(0);
        info!(
            worker = %app.decision_connection,
            outstanding,
            "worker state at end of run"
        );
    }

    dfo.scrap()?;
    info!("simulation finished");
    Ok(())
}

/// Install a record-builder callback for every configured worker.
fn spawn_workers(
    network: &Arc<InProcessNetwork>,
    config: &OrchestratorConfig,
    build_time: Duration,
) -> Result<(), CliError> {
    for app in &config.dataflow_applications {
        network.start_listening(&app.decision_connection)?;

        let worker_name = app.decision_connection.clone();
        let token_connection = config.token_connection.clone();
        let responder = Arc::clone(network);
        let send_timeout = config.general_queue_timeout;

        network.register_callback(
            &app.decision_connection,
            Arc::new(move |bytes: &[u8]| {
                let decision = match TriggerDecision::from_bytes(bytes) {
                    Ok(decision) => decision,
                    Err(codec_error) => {
                        warn!(worker = %worker_name, error = %codec_error, "undecodable decision");
                        return;
                    }
                };

                // Pretend to assemble and write the trigger record.
                thread::sleep(build_time);

                let token = CompletionToken {
                    run_number: decision.run_number,
                    trigger_number: decision.trigger_number,
                    decision_destination: worker_name.clone(),
                };
                match token.to_bytes() {
                    Ok(token_bytes) => {
                        if let Err(send_error) =
                            responder.send_to(&token_connection, &token_bytes, send_timeout)
                        {
                            warn!(worker = %worker_name, error = %send_error, "token send failed");
                        }
                    }
                    Err(codec_error) => {
                        warn!(worker = %worker_name, error = %codec_error, "token encode failed");
                    }
                }
            }),
        )?;
    }
    Ok(())
}

/// Feed the decision queue at roughly `rate` decisions per second.
fn spawn_producer(
    queue: Arc<DecisionQueue>,
    rate: u64,
    producing: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let interval = Duration::from_micros(1_000_000 / rate.max(1));
    thread::Builder::new()
        .name("sim-producer".to_string())
        .spawn(move || {
            let mut trigger_number = 0u64;
            while producing.load(Ordering::Relaxed) {
                trigger_number += 1;
                let decision = TriggerDecision::new(trigger_number, SIM_RUN_NUMBER);
                // Backpressure from a full queue just slows production down.
                if let Err((_, queue_error)) = queue.push(decision, Duration::from_millis(100)) {
                    warn!(trigger_number, error = %queue_error, "decision not queued");
                }
                thread::sleep(interval);
            }
            info!(produced = trigger_number, "producer finished");
        })
        .expect("failed to spawn producer thread")
}
