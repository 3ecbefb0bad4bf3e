//! Work queue and scheduling policy
//!
//! The queue hands out each of the N² cells exactly once. Which cell a free
//! worker gets next depends on the [`Schedule`].

use crate::distributed::protocol::Cell;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Any free worker takes the next cell in row-major order
    #[default]
    Dynamic,
    /// Row `i` belongs to worker `i % workers`; workers only take their own cells
    Static,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => f.write_str("dynamic"),
            Self::Static => f.write_str("static"),
        }
    }
}

/// Cells not yet dispatched
#[derive(Debug)]
pub enum WorkQueue {
    Dynamic {
        dimension: usize,
        next: usize,
    },
    Static {
        queues: Vec<VecDeque<Cell>>,
    },
}

impl WorkQueue {
    pub fn new(schedule: Schedule, dimension: usize, workers: usize) -> Self {
        match schedule {
            Schedule::Dynamic => Self::Dynamic { dimension, next: 0 },
            Schedule::Static => {
                let mut queues = vec![VecDeque::new(); workers];
                if workers > 0 {
                    for row in 0..dimension {
                        let owner = &mut queues[row % workers];
                        owner.extend((0..dimension).map(|col| Cell::new(row, col)));
                    }
                }
                Self::Static { queues }
            }
        }
    }

    /// Take the next cell for `worker`, if any remains for it
    pub fn next_for(&mut self, worker: usize) -> Option<Cell> {
        match self {
            Self::Dynamic { dimension, next } => {
                let total = *dimension * *dimension;
                if *next >= total {
                    return None;
                }
                let k = *next;
                *next += 1;
                Some(Cell::new(k / *dimension, k % *dimension))
            }
            Self::Static { queues } => queues.get_mut(worker)?.pop_front(),
        }
    }

    /// Number of cells not yet handed out
    pub fn remaining(&self) -> usize {
        match self {
            Self::Dynamic { dimension, next } => (*dimension * *dimension).saturating_sub(*next),
            Self::Static { queues } => queues.iter().map(VecDeque::len).sum(),
        }
    }
}
