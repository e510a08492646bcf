//! Frozen worker topology with a rotating selection cursor.

use super::{Assignment, WorkerState};
use crate::messages::TriggerDecision;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ordered collection of workers, built at configure time and structurally
/// immutable until scrap.
///
/// Selection walks the workers in insertion order starting one past the
/// cursor, wrapping at the end; the cursor remembers the last worker chosen
/// so consecutive dispatches round-robin across free workers. The cursor is
/// only ever advanced by the dispatcher thread; the token path uses the
/// name lookup and never touches it.
pub struct WorkerTable {
    workers: Vec<Arc<WorkerState>>,
    by_name: HashMap<String, usize>,
    cursor: AtomicUsize,
}

impl WorkerTable {
    /// Freeze `workers` into a table. Insertion order is selection order.
    pub fn new(workers: Vec<WorkerState>) -> Self {
        let workers: Vec<Arc<WorkerState>> = workers.into_iter().map(Arc::new).collect();
        let by_name = workers
            .iter()
            .enumerate()
            .map(|(index, worker)| (worker.connection_name().to_string(), index))
            .collect();
        // Start the cursor on the last worker so the first advancement
        // lands on the first.
        let cursor = AtomicUsize::new(workers.len().saturating_sub(1));
        Self {
            workers,
            by_name,
            cursor,
        }
    }

    /// Find a worker with a free slot and bind `decision` to it.
    ///
    /// Advances the cursor before each probe and gives up after one full
    /// revolution. `None` means no worker is currently free; the caller
    /// retries once a slot signal arrives.
    pub fn find_slot(
        &self,
        decision: &TriggerDecision,
    ) -> Option<(Arc<WorkerState>, Arc<Assignment>)> {
        let count = self.workers.len();
        if count == 0 {
            return None;
        }

        let mut position = self.cursor.load(Ordering::Relaxed);
        for _ in 0..count {
            position = (position + 1) % count;
            let worker = &self.workers[position];
            if worker.has_slot() {
                self.cursor.store(position, Ordering::Relaxed);
                let assignment = worker.make_assignment(decision.clone());
                return Some((Arc::clone(worker), assignment));
            }
        }
        None
    }

    /// True when at least one worker could accept an assignment.
    pub fn has_slot(&self) -> bool {
        self.workers.iter().any(|worker| worker.has_slot())
    }

    /// Look up a worker by connection name.
    pub fn get(&self, connection_name: &str) -> Option<&Arc<WorkerState>> {
        self.by_name
            .get(connection_name)
            .map(|&index| &self.workers[index])
    }

    /// Workers in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkerState>> {
        self.workers.iter()
    }

    /// Number of workers in the table.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when the table holds no workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(n: u64) -> TriggerDecision {
        TriggerDecision::new(n, 1)
    }

    fn table(specs: &[(&str, usize)]) -> WorkerTable {
        WorkerTable::new(
            specs
                .iter()
                .map(|(name, capacity)| WorkerState::new(*name, *capacity))
                .collect(),
        )
    }

    #[test]
    fn test_round_robin_rotation() {
        let table = table(&[("a", 2), ("b", 2)]);

        let order: Vec<String> = (1..=4)
            .map(|n| {
                let (worker, assignment) = table.find_slot(&decision(n)).unwrap();
                worker.add_assignment(assignment).unwrap();
                worker.connection_name().to_string()
            })
            .collect();

        assert_eq!(order, ["a", "b", "a", "b"]);
    }

    #[test]
    fn test_selection_skips_busy_worker() {
        let table = table(&[("a", 1), ("b", 2)]);

        let (first, assignment) = table.find_slot(&decision(1)).unwrap();
        assert_eq!(first.connection_name(), "a");
        first.add_assignment(assignment).unwrap();

        // "a" is now at capacity; both following picks land on "b".
        for n in 2..=3 {
            let (worker, assignment) = table.find_slot(&decision(n)).unwrap();
            assert_eq!(worker.connection_name(), "b");
            worker.add_assignment(assignment).unwrap();
        }
    }

    #[test]
    fn test_selection_skips_quarantined_worker() {
        let table = table(&[("a", 5), ("b", 5)]);
        table.get("a").unwrap().set_in_error(true);

        for n in 1..=3 {
            let (worker, _) = table.find_slot(&decision(n)).unwrap();
            assert_eq!(worker.connection_name(), "b");
        }
    }

    #[test]
    fn test_full_revolution_returns_none() {
        let table = table(&[("a", 1), ("b", 1)]);
        for n in 1..=2 {
            let (worker, assignment) = table.find_slot(&decision(n)).unwrap();
            worker.add_assignment(assignment).unwrap();
        }

        assert!(table.find_slot(&decision(3)).is_none());
        assert!(!table.has_slot());
    }

    #[test]
    fn test_empty_table() {
        let table = WorkerTable::new(Vec::new());
        assert!(table.is_empty());
        assert!(!table.has_slot());
        assert!(table.find_slot(&decision(1)).is_none());
    }

    #[test]
    fn test_lookup_by_name() {
        let table = table(&[("a", 1), ("b", 1)]);
        assert_eq!(table.get("b").unwrap().connection_name(), "b");
        assert!(table.get("c").is_none());
    }

    #[test]
    fn test_assignment_carries_worker_name() {
        let table = table(&[("a", 1)]);
        let (_, assignment) = table.find_slot(&decision(9)).unwrap();
        assert_eq!(assignment.connection_name, "a");
        assert_eq!(assignment.trigger_number(), 9);
    }
}
