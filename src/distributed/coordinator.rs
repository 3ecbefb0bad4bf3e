//! Coordinator
//!
//! This module implements the demand-driven scheduling loop. The coordinator:
//! - Owns A, B and the output C
//! - Sends one work unit to every worker
//! - Waits for a result from whichever worker answers first
//! - Writes the result into C and immediately replenishes that same worker,
//!   or sends it TERMINATE once no work is left for it
//!
//! Backpressure comes from the protocol itself: a worker is only sent its next
//! unit after its previous result has been received, so at most one unit per
//! worker is ever outstanding.
//!
//! # Worker loss
//!
//! Nothing is retried and nothing is re-issued. If a worker dies while others
//! are still connected the coordinator waits for it indefinitely unless a
//! result timeout is configured, in which case the run fails with
//! [`ProtocolError::ResultTimeout`]. If every connection closes the run fails
//! with [`ProtocolError::WorkersDisconnected`]. A connection that fails or
//! delivers an undecodable frame ends the run at the next receive.

use crate::distributed::link::{CoordinatorLink, Envelope, WorkerId};
use crate::distributed::protocol::{Cell, CellResult, Message, WorkUnit};
use crate::distributed::schedule::{Schedule, WorkQueue};
use crate::error::ProtocolError;
use crate::matrix::Matrix;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Product of a completed run
#[derive(Debug, Clone)]
pub struct Product {
    /// C = A * B
    pub matrix: Matrix,
    pub stats: DispatchStats,
}

/// Message accounting for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// WORK messages sent
    pub units_dispatched: usize,
    /// RESULT messages accepted
    pub results_received: usize,
    pub per_worker: Vec<WorkerDispatch>,
}

/// Per-worker message accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDispatch {
    pub worker: WorkerId,
    pub units_dispatched: usize,
    pub results_received: usize,
    pub terminated: bool,
}

impl DispatchStats {
    fn new(workers: usize) -> Self {
        Self {
            units_dispatched: 0,
            results_received: 0,
            per_worker: (0..workers)
                .map(|worker| WorkerDispatch {
                    worker,
                    ..Default::default()
                })
                .collect(),
        }
    }

    /// Workers that were never sent a work unit
    pub fn idle_workers(&self) -> usize {
        self.per_worker.iter().filter(|w| w.units_dispatched == 0).count()
    }
}

/// Demand-driven coordinator
pub struct Coordinator {
    a: Matrix,
    b: Matrix,
    schedule: Schedule,
    result_timeout: Option<Duration>,
}

impl Coordinator {
    /// Create a coordinator for `a * b`
    pub fn new(a: Matrix, b: Matrix) -> Result<Self> {
        if a.dimension() != b.dimension() {
            anyhow::bail!(
                "Matrix dimensions incompatible: A is {}x{}, B is {}x{}",
                a.dimension(),
                a.dimension(),
                b.dimension(),
                b.dimension()
            );
        }
        if a.dimension() == 0 {
            anyhow::bail!("Matrix dimension must be at least 1");
        }

        Ok(Self {
            a,
            b,
            schedule: Schedule::default(),
            result_timeout: None,
        })
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Fail instead of waiting forever when no result arrives in time
    pub fn with_result_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.result_timeout = timeout;
        self
    }

    /// Run the protocol to completion over `link`
    ///
    /// Returns C only after all N² results have been received and every
    /// worker has been sent exactly one TERMINATE.
    pub async fn run(self, mut link: CoordinatorLink) -> Result<Product> {
        let workers = link.worker_count();
        if workers == 0 {
            anyhow::bail!("No workers available");
        }

        let n = self.a.dimension();
        let total = self.a.cell_count();
        info!(dimension = n, workers, schedule = %self.schedule, "starting distributed multiplication");

        let mut dispatcher = Dispatcher {
            a: &self.a,
            b: &self.b,
            queue: WorkQueue::new(self.schedule, n, workers),
            outstanding: vec![None; workers],
            stats: DispatchStats::new(workers),
        };
        let mut c = Matrix::zeros(n);
        let mut completed = vec![false; total];

        // Dispatch phase: one unit per worker, or TERMINATE if none is left for it
        for worker in 0..workers {
            dispatcher.replenish(&mut link, worker)?;
        }

        // Collection / replenishment loop
        for received in 0..total {
            let Envelope { source, message } = self.receive(&mut link, total - received).await?;

            let result = match message {
                Message::Result(result) => result,
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        role: "coordinator",
                        kind: other.kind(),
                        from: Some(source),
                    }
                    .into())
                }
            };

            if result.row < n && result.col < n && completed[result.row * n + result.col] {
                return Err(ProtocolError::DuplicateResult {
                    worker: source,
                    row: result.row,
                    col: result.col,
                }
                .into());
            }
            dispatcher.accept(source, &result)?;

            c.set(result.row, result.col, result.value)?;
            completed[result.row * n + result.col] = true;

            dispatcher.replenish(&mut link, source)?;
        }

        let stats = dispatcher.stats;
        if let Some(w) = stats.per_worker.iter().find(|w| !w.terminated) {
            anyhow::bail!("Worker {} was not terminated after all results were collected", w.worker);
        }

        link.close().await?;
        info!(
            units = stats.units_dispatched,
            idle_workers = stats.idle_workers(),
            "multiplication complete"
        );

        Ok(Product { matrix: c, stats })
    }

    async fn receive(&self, link: &mut CoordinatorLink, pending: usize) -> Result<Envelope> {
        let next = match self.result_timeout {
            Some(timeout) => tokio::time::timeout(timeout, link.recv_any())
                .await
                .map_err(|_| ProtocolError::ResultTimeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    pending,
                })?,
            None => link.recv_any().await,
        };

        next.ok_or(ProtocolError::WorkersDisconnected { pending })?
    }
}

/// Scheduling state for one run
struct Dispatcher<'a> {
    a: &'a Matrix,
    b: &'a Matrix,
    queue: WorkQueue,
    /// Cell currently held by each worker
    outstanding: Vec<Option<Cell>>,
    stats: DispatchStats,
}

impl Dispatcher<'_> {
    /// Give `worker` its next unit, or TERMINATE if none remains for it
    fn replenish(&mut self, link: &mut CoordinatorLink, worker: WorkerId) -> Result<()> {
        match self.queue.next_for(worker) {
            Some(cell) => {
                let unit = WorkUnit {
                    row: cell.row,
                    col: cell.col,
                    row_vector: self.a.row(cell.row)?.to_vec(),
                    col_vector: self.b.column(cell.col)?,
                };
                link.send(worker, Message::Work(unit))?;
                debug!(
                    worker,
                    row = cell.row,
                    col = cell.col,
                    remaining = self.queue.remaining(),
                    "dispatched work unit"
                );

                self.outstanding[worker] = Some(cell);
                self.stats.units_dispatched += 1;
                self.stats.per_worker[worker].units_dispatched += 1;
            }
            None => {
                link.send(worker, Message::Terminate)?;
                link.close_outbox(worker);
                debug!(worker, "sent terminate");

                self.stats.per_worker[worker].terminated = true;
            }
        }
        Ok(())
    }

    /// Match a result against the unit its sender is holding
    fn accept(&mut self, worker: WorkerId, result: &CellResult) -> Result<()> {
        let slot = self.outstanding.get_mut(worker).ok_or(ProtocolError::WorkerOutOfRange {
            worker,
            workers: self.stats.per_worker.len(),
        })?;

        if *slot != Some(result.cell()) {
            return Err(ProtocolError::UnassignedResult {
                worker,
                row: result.row,
                col: result.col,
                assigned: slot.map_or_else(|| "nothing".to_string(), |cell| cell.to_string()),
            }
            .into());
        }

        *slot = None;
        self.stats.results_received += 1;
        self.stats.per_worker[worker].results_received += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::local;
    use crate::distributed::protocol::{read_message, write_message, MessageKind};
    use crate::matrix::source::{example_pair, random_pair};
    use std::collections::HashSet;
    use tokio::io::{duplex, split, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;

    type Remote = (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>);

    fn pipes(count: usize) -> (CoordinatorLink, Vec<Remote>) {
        let mut local = Vec::new();
        let mut remote = Vec::new();
        for _ in 0..count {
            let (a, b) = duplex(64 * 1024);
            local.push(split(a));
            remote.push(split(b));
        }
        (CoordinatorLink::from_streams(local), remote)
    }

    /// Well-behaved worker that records every message it receives
    ///
    /// While holding a unit it checks that nothing else arrives.
    fn recording_worker(mut remote: Remote, delay: Duration) -> JoinHandle<Vec<Message>> {
        tokio::spawn(async move {
            let mut log = Vec::new();
            while let Some(msg) = read_message(&mut remote.0).await.unwrap() {
                log.push(msg.clone());
                if let Message::Work(unit) = msg {
                    tokio::time::sleep(delay).await;
                    let early = tokio::time::timeout(Duration::from_millis(5), read_message(&mut remote.0)).await;
                    assert!(early.is_err(), "second message arrived while a unit was outstanding");

                    let result = unit.compute().unwrap();
                    write_message(&mut remote.1, &Message::Result(result)).await.unwrap();
                }
            }
            log
        })
    }

    fn kinds(log: &[Message]) -> Vec<MessageKind> {
        log.iter().map(Message::kind).collect()
    }

    fn assert_terminated_once_last(log: &[Message]) {
        let terminates = log.iter().filter(|m| **m == Message::Terminate).count();
        assert_eq!(terminates, 1, "expected exactly one terminate in {:?}", kinds(log));
        assert_eq!(log.last(), Some(&Message::Terminate));
    }

    #[tokio::test]
    async fn test_two_by_two_single_worker() {
        let a = Matrix::from_rows(vec![vec![0, 1], vec![1, 2]]).unwrap();
        let b = Matrix::from_rows(vec![vec![0, 0], vec![0, 1]]).unwrap();

        let (link, workers) = local::spawn(1);
        let product = Coordinator::new(a, b).unwrap().run(link).await.unwrap();

        assert_eq!(product.matrix, Matrix::from_rows(vec![vec![0, 1], vec![0, 2]]).unwrap());
        assert_eq!(product.stats.units_dispatched, 4);
        assert_eq!(product.stats.results_received, 4);
        assert_eq!(product.stats.per_worker[0].units_dispatched, 4);
        assert!(product.stats.per_worker[0].terminated);

        let summaries = workers.join().await.unwrap();
        assert_eq!(summaries[0].units_computed, 4);
    }

    #[tokio::test]
    async fn test_single_worker_receives_units_sequentially() {
        let a = Matrix::from_rows(vec![vec![0, 1], vec![1, 2]]).unwrap();
        let b = Matrix::from_rows(vec![vec![0, 0], vec![0, 1]]).unwrap();

        let (link, mut remote) = pipes(1);
        let worker = recording_worker(remote.remove(0), Duration::ZERO);
        let product = Coordinator::new(a, b).unwrap().run(link).await.unwrap();
        let log = worker.await.unwrap();

        assert_eq!(product.matrix, Matrix::from_rows(vec![vec![0, 1], vec![0, 2]]).unwrap());
        let cells: Vec<_> = log
            .iter()
            .filter_map(|m| match m {
                Message::Work(unit) => Some(unit.cell()),
                _ => None,
            })
            .collect();
        assert_eq!(
            cells,
            vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 0), Cell::new(1, 1)]
        );
        assert_terminated_once_last(&log);
    }

    #[tokio::test]
    async fn test_identity_times_b_is_b() {
        let b = Matrix::from_rows(vec![vec![4, -1, 7], vec![0, 3, 3], vec![-8, 2, 5]]).unwrap();

        let (link, workers) = local::spawn(3);
        let product = Coordinator::new(Matrix::identity(3), b.clone())
            .unwrap()
            .run(link)
            .await
            .unwrap();

        assert_eq!(product.matrix, b);
        workers.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_every_cell_dispatched_exactly_once() {
        let (a, b) = random_pair(5, 11, -20, 20).unwrap();
        let expected = a.multiply(&b).unwrap();

        let (link, remote) = pipes(3);
        let handles: Vec<_> = remote
            .into_iter()
            .map(|r| recording_worker(r, Duration::ZERO))
            .collect();
        let product = Coordinator::new(a, b).unwrap().run(link).await.unwrap();

        let mut cells = HashSet::new();
        let mut work_messages = 0;
        for handle in handles {
            let log = handle.await.unwrap();
            assert_terminated_once_last(&log);
            for msg in &log {
                if let Message::Work(unit) = msg {
                    work_messages += 1;
                    assert!(cells.insert(unit.cell()), "{} dispatched twice", unit.cell());
                }
            }
        }

        assert_eq!(work_messages, 25);
        assert_eq!(cells.len(), 25);
        assert_eq!(product.stats.units_dispatched, 25);
        assert_eq!(product.stats.results_received, 25);
        assert_eq!(product.matrix, expected);
    }

    #[tokio::test]
    async fn test_more_workers_than_cells() {
        let (a, b) = example_pair(2);
        let expected = a.multiply(&b).unwrap();

        let (link, remote) = pipes(7);
        let handles: Vec<_> = remote
            .into_iter()
            .map(|r| recording_worker(r, Duration::ZERO))
            .collect();
        let product = Coordinator::new(a, b).unwrap().run(link).await.unwrap();
        assert_eq!(product.matrix, expected);
        assert_eq!(product.stats.idle_workers(), 3);

        for (i, handle) in handles.into_iter().enumerate() {
            let log = handle.await.unwrap();
            assert_terminated_once_last(&log);
            if i >= 4 {
                assert_eq!(kinds(&log), vec![MessageKind::Terminate], "worker {}", i);
            }
        }
    }

    #[tokio::test]
    async fn test_result_independent_of_worker_speed() {
        let (a, b) = random_pair(6, 3, -50, 50).unwrap();
        let expected = a.multiply(&b).unwrap();

        for delays in [[0u64, 2, 5], [5, 2, 0]] {
            let (link, remote) = pipes(3);
            let handles: Vec<_> = remote
                .into_iter()
                .zip(delays)
                .map(|(r, ms)| recording_worker(r, Duration::from_millis(ms)))
                .collect();

            let product = Coordinator::new(a.clone(), b.clone()).unwrap().run(link).await.unwrap();
            assert_eq!(product.matrix, expected);

            for handle in handles {
                assert_terminated_once_last(&handle.await.unwrap());
            }
        }
    }

    #[tokio::test]
    async fn test_fast_worker_takes_more_units() {
        let (a, b) = random_pair(6, 5, -9, 9).unwrap();

        let (link, remote) = pipes(2);
        let mut remote = remote.into_iter();
        let fast = recording_worker(remote.next().unwrap(), Duration::ZERO);
        let slow = recording_worker(remote.next().unwrap(), Duration::from_millis(40));

        let product = Coordinator::new(a, b).unwrap().run(link).await.unwrap();
        fast.await.unwrap();
        slow.await.unwrap();

        let per_worker = &product.stats.per_worker;
        assert!(per_worker[0].units_dispatched > per_worker[1].units_dispatched);
        assert_eq!(per_worker[0].units_dispatched + per_worker[1].units_dispatched, 36);
    }

    #[tokio::test]
    async fn test_static_schedule_keeps_row_ownership() {
        let (a, b) = random_pair(5, 9, -5, 5).unwrap();
        let expected = a.multiply(&b).unwrap();

        let (link, remote) = pipes(2);
        let handles: Vec<_> = remote
            .into_iter()
            .map(|r| recording_worker(r, Duration::ZERO))
            .collect();
        let product = Coordinator::new(a, b)
            .unwrap()
            .with_schedule(Schedule::Static)
            .run(link)
            .await
            .unwrap();
        assert_eq!(product.matrix, expected);

        for (worker, handle) in handles.into_iter().enumerate() {
            let log = handle.await.unwrap();
            assert_terminated_once_last(&log);
            for msg in &log {
                if let Message::Work(unit) = msg {
                    assert_eq!(unit.row % 2, worker);
                }
            }
        }
        assert_eq!(product.stats.per_worker[0].units_dispatched, 15);
        assert_eq!(product.stats.per_worker[1].units_dispatched, 10);
    }

    #[tokio::test]
    async fn test_many_local_workers_both_schedules() {
        let (a, b) = random_pair(12, 42, -100, 100).unwrap();
        let expected = a.multiply(&b).unwrap();

        for schedule in [Schedule::Dynamic, Schedule::Static] {
            let (link, workers) = local::spawn(5);
            let product = Coordinator::new(a.clone(), b.clone())
                .unwrap()
                .with_schedule(schedule)
                .run(link)
                .await
                .unwrap();
            assert_eq!(product.matrix, expected, "schedule {}", schedule);

            let computed: usize = workers.join().await.unwrap().iter().map(|s| s.units_computed).sum();
            assert_eq!(computed, 144);
        }
    }

    #[tokio::test]
    async fn test_duplicate_result_is_fatal() {
        let (a, b) = example_pair(2);
        let (link, mut remote) = pipes(1);
        let mut r = remote.remove(0);

        let worker = tokio::spawn(async move {
            if let Some(Message::Work(unit)) = read_message(&mut r.0).await.unwrap() {
                let result = Message::Result(unit.compute().unwrap());
                write_message(&mut r.1, &result).await.unwrap();
                // Wait for the replenished unit, then answer the old one again
                let _ = read_message(&mut r.0).await;
                write_message(&mut r.1, &result).await.unwrap();
            }
            while let Ok(Some(_)) = read_message(&mut r.0).await {}
        });

        let err = Coordinator::new(a, b).unwrap().run(link).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProtocolError>(),
            Some(&ProtocolError::DuplicateResult { worker: 0, row: 0, col: 0 })
        );
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_result_for_unassigned_cell_is_fatal() {
        let (a, b) = example_pair(2);
        let (link, mut remote) = pipes(1);
        let mut r = remote.remove(0);

        let worker = tokio::spawn(async move {
            let _ = read_message(&mut r.0).await;
            let wrong = Message::Result(CellResult { row: 1, col: 1, value: 0 });
            write_message(&mut r.1, &wrong).await.unwrap();
            while let Ok(Some(_)) = read_message(&mut r.0).await {}
        });

        let err = Coordinator::new(a, b).unwrap().run(link).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnassignedResult { worker: 0, row: 1, col: 1, .. })
        ));
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_message_from_worker_is_fatal() {
        let (a, b) = example_pair(2);
        let (link, mut remote) = pipes(1);
        let mut r = remote.remove(0);

        let worker = tokio::spawn(async move {
            let _ = read_message(&mut r.0).await;
            write_message(&mut r.1, &Message::Terminate).await.unwrap();
            while let Ok(Some(_)) = read_message(&mut r.0).await {}
        });

        let err = Coordinator::new(a, b).unwrap().run(link).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnexpectedMessage {
                kind: MessageKind::Terminate,
                from: Some(0),
                ..
            })
        ));
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_fatal_while_others_connected() {
        let (a, b) = example_pair(2);
        let (link, mut remote) = pipes(2);
        let mut garbled = remote.pop().unwrap();
        let mut silent = remote.pop().unwrap();

        // Holds its unit and never answers, so only the bad frame can end the run
        let holder = tokio::spawn(async move { while let Ok(Some(_)) = read_message(&mut silent.0).await {} });
        let sender = tokio::spawn(async move {
            let _ = read_message(&mut garbled.0).await;
            let body = rmp_serde::to_vec(&"Heartbeat").unwrap();
            let mut frame = (body.len() as u32).to_le_bytes().to_vec();
            frame.extend_from_slice(&body);
            garbled.1.write_all(&frame).await.unwrap();
            while let Ok(Some(_)) = read_message(&mut garbled.0).await {}
        });

        let err = tokio::time::timeout(Duration::from_secs(5), Coordinator::new(a, b).unwrap().run(link))
            .await
            .expect("coordinator kept waiting after an undecodable frame")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UndecodableFrame { .. })
        ));
        assert!(format!("{:#}", err).contains("worker 1"));

        holder.await.unwrap();
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn test_all_workers_disconnected() {
        let (a, b) = example_pair(3);
        let (link, remote) = pipes(2);
        drop(remote);

        let err = Coordinator::new(a, b).unwrap().run(link).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::WorkersDisconnected { pending: 9 })
        ));
    }

    #[tokio::test]
    async fn test_result_timeout() {
        let (a, b) = example_pair(2);
        let (link, mut remote) = pipes(1);
        let mut r = remote.remove(0);

        // Holds its unit forever
        let worker = tokio::spawn(async move { while let Ok(Some(_)) = read_message(&mut r.0).await {} });

        let err = Coordinator::new(a, b)
            .unwrap()
            .with_result_timeout(Some(Duration::from_millis(50)))
            .run(link)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::ResultTimeout { timeout_ms: 50, pending: 4 })
        ));
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_invalid_setup() {
        assert!(Coordinator::new(Matrix::zeros(2), Matrix::zeros(3)).is_err());
        assert!(Coordinator::new(Matrix::zeros(0), Matrix::zeros(0)).is_err());

        let (link, _remote) = pipes(0);
        let err = Coordinator::new(Matrix::zeros(2), Matrix::zeros(2))
            .unwrap()
            .run(link)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No workers"));
    }
}
