// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Statistics Transport
//!
//! A generic collect-and-reduce: every rank hands in a flat `i64` record
//! plus the reducer of each field, and the root (rank 0) gets the reduced
//! record back. The engine knows nothing about process topology beyond
//! this call.
//!
//! `RepeatSum { count }` covers the next `count` fields, summed
//! element-wise, so records with a variable tail need a single entry.

use std::sync::{Arc, Barrier, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    Sum,
    Min,
    Max,
    RepeatSum { count: usize },
}

impl Reducer {
    fn width(&self) -> usize {
        match self {
            Reducer::RepeatSum { count } => *count,
            _ => 1,
        }
    }
}

/// Fields covered by a reducer list
pub fn record_len(reducers: &[Reducer]) -> usize {
    reducers.iter().map(Reducer::width).sum()
}

/// Fold `incoming` into `acc` field by field.
pub fn reduce_into(acc: &mut [i64], incoming: &[i64], reducers: &[Reducer]) -> Result<()> {
    let len = record_len(reducers);
    if acc.len() != len || incoming.len() != len {
        return Err(CoreError::Transport(format!(
            "record of {} / {} fields for {} reducer fields",
            acc.len(),
            incoming.len(),
            len
        )));
    }
    let mut i = 0;
    for reducer in reducers {
        match reducer {
            Reducer::Sum => acc[i] = acc[i].saturating_add(incoming[i]),
            Reducer::Min => acc[i] = acc[i].min(incoming[i]),
            Reducer::Max => acc[i] = acc[i].max(incoming[i]),
            Reducer::RepeatSum { count } => {
                for k in i..i + count {
                    acc[k] = acc[k].saturating_add(incoming[k]);
                }
            }
        }
        i += reducer.width();
    }
    Ok(())
}

pub trait StatsTransport: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Reduce `local` across every rank. The root gets `Some(result)`,
    /// everyone else `None`.
    fn collect(&self, local: &[i64], reducers: &[Reducer]) -> Result<Option<Vec<i64>>>;
}

/// Single-process transport: the local record is the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl StatsTransport for LocalTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn collect(&self, local: &[i64], reducers: &[Reducer]) -> Result<Option<Vec<i64>>> {
        if local.len() != record_len(reducers) {
            return Err(CoreError::Transport(format!(
                "record of {} fields for {} reducer fields",
                local.len(),
                record_len(reducers)
            )));
        }
        Ok(Some(local.to_vec()))
    }
}

#[derive(Debug)]
struct Shared {
    size: usize,
    barrier: Barrier,
    slot: Mutex<Option<Vec<i64>>>,
    error: Mutex<Option<String>>,
}

/// Threads of one process acting as ranks.
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    rank: usize,
    shared: Arc<Shared>,
}

impl InProcessTransport {
    /// One handle per rank; hand each to its own thread.
    pub fn group(size: usize) -> Vec<InProcessTransport> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slot: Mutex::new(None),
            error: Mutex::new(None),
        });
        (0..size)
            .map(|rank| InProcessTransport {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Transport("rank panicked during collection".to_string())
}

impl StatsTransport for InProcessTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn collect(&self, local: &[i64], reducers: &[Reducer]) -> Result<Option<Vec<i64>>> {
        {
            let mut slot = self.shared.slot.lock().map_err(poisoned)?;
            let folded = match slot.as_mut() {
                None => {
                    *slot = Some(local.to_vec());
                    Ok(())
                }
                Some(acc) => reduce_into(acc, local, reducers),
            };
            if let Err(e) = folded {
                *self.shared.error.lock().map_err(poisoned)? = Some(e.to_string());
            }
        }
        self.shared.barrier.wait();
        let result = if self.rank == 0 {
            let taken = self.shared.slot.lock().map_err(poisoned)?.take();
            let error = self.shared.error.lock().map_err(poisoned)?.take();
            Some((taken, error))
        } else {
            None
        };
        // nobody starts the next collection before the root has emptied the slot
        self.shared.barrier.wait();
        match result {
            None => Ok(None),
            Some((_, Some(message))) => Err(CoreError::Transport(message)),
            Some((taken, None)) => Ok(Some(taken.unwrap_or_default())),
        }
    }
}
