//! Per-worker capacity accounting and worker selection.
//!
//! Each downstream TRB worker is represented by a [`WorkerState`]: the list
//! of outstanding assignments, busy/free hysteresis thresholds, a latency
//! history window, and an error flag used to quarantine unreachable workers.
//! The [`WorkerTable`] holds the configure-time-frozen set of workers plus
//! the rotating cursor that gives round-robin selection.
//!
//! # Concurrency
//!
//! A `WorkerState` is mutated from two sides at once: the dispatcher thread
//! records assignments, the token callback completes them on a network
//! thread. Structural state (`outstanding`, `latency_window`, `metadata`)
//! sits behind its own mutex; the busy and error flags are atomics so the
//! selector's fast path takes no lock. No two of the mutexes are ever held
//! at the same time.

mod assignment;
mod error;
mod state;
mod table;

pub use assignment::Assignment;
pub use error::WorkerError;
pub use state::{MetadataCallback, WorkerState, LATENCY_WINDOW_CAPACITY};
pub use table::WorkerTable;
