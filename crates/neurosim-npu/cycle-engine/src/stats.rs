// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-population statistics.
//!
//! Everything is an integer so parts merge exactly in any order. For the
//! transport a record flattens to
//!
//! ```text
//! [cells, response_sum, min, max, fired, overflow, afference_0 .. afference_n]
//!  Sum    Sum           Min  Max  Sum    Sum      RepeatSum { count: n }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::interfaces::stats_transport::Reducer;

const FIXED_FIELDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Cell updates counted (cells x cycles)
    pub cells: u64,
    /// S14
    pub response_sum: i64,
    pub response_min: i32,
    pub response_max: i32,
    pub fired: u64,
    pub overflow: u64,
    /// Net afference delivered per connection type (S20)
    pub connection_afference: Vec<i64>,
}

impl PopulationStats {
    pub fn empty(connections: usize) -> Self {
        Self {
            cells: 0,
            response_sum: 0,
            response_min: i32::MAX,
            response_max: i32::MIN,
            fired: 0,
            overflow: 0,
            connection_afference: vec![0; connections],
        }
    }

    #[inline]
    pub fn record(&mut self, response: i32, fired: bool) {
        self.cells += 1;
        self.response_sum = self.response_sum.saturating_add(response as i64);
        self.response_min = self.response_min.min(response);
        self.response_max = self.response_max.max(response);
        self.fired += fired as u64;
    }

    pub fn merge(&mut self, other: &PopulationStats) {
        self.cells += other.cells;
        self.response_sum = self.response_sum.saturating_add(other.response_sum);
        self.response_min = self.response_min.min(other.response_min);
        self.response_max = self.response_max.max(other.response_max);
        self.fired += other.fired;
        self.overflow += other.overflow;
        for (a, b) in self
            .connection_afference
            .iter_mut()
            .zip(&other.connection_afference)
        {
            *a = a.saturating_add(*b);
        }
    }

    /// Mean response over every recorded update (S14)
    pub fn mean_response(&self) -> i64 {
        if self.cells == 0 {
            0
        } else {
            self.response_sum / self.cells as i64
        }
    }

    pub fn reducers(&self) -> Vec<Reducer> {
        vec![
            Reducer::Sum,
            Reducer::Sum,
            Reducer::Min,
            Reducer::Max,
            Reducer::Sum,
            Reducer::Sum,
            Reducer::RepeatSum {
                count: self.connection_afference.len(),
            },
        ]
    }

    pub fn flatten(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(FIXED_FIELDS + self.connection_afference.len());
        out.extend([
            self.cells as i64,
            self.response_sum,
            self.response_min as i64,
            self.response_max as i64,
            self.fired as i64,
            self.overflow as i64,
        ]);
        out.extend_from_slice(&self.connection_afference);
        out
    }

    pub fn unflatten(values: &[i64]) -> Result<Self> {
        if values.len() < FIXED_FIELDS {
            return Err(CoreError::Internal(format!(
                "statistics record of {} fields",
                values.len()
            )));
        }
        Ok(Self {
            cells: values[0].max(0) as u64,
            response_sum: values[1],
            response_min: values[2].clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            response_max: values[3].clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            fired: values[4].max(0) as u64,
            overflow: values[5].max(0) as u64,
            connection_afference: values[FIXED_FIELDS..].to_vec(),
        })
    }
}
