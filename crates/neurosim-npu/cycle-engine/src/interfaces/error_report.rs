// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error-reporting collaborator: one non-returning call that ends the run.

use tracing::error;

use crate::error::ErrorReport;

pub trait ErrorReporter: Send + Sync {
    /// Report a fatal error and terminate. Never returns.
    fn abort(&self, report: &ErrorReport) -> !;
}

/// Logs the report at `error` level and exits the process.
#[derive(Debug, Clone, Copy)]
pub struct TracingErrorReporter {
    pub exit_code: i32,
}

impl Default for TracingErrorReporter {
    fn default() -> Self {
        Self { exit_code: 1 }
    }
}

impl ErrorReporter for TracingErrorReporter {
    fn abort(&self, report: &ErrorReport) -> ! {
        error!(
            "[ERROR-REPORT] code={} payload={}: {}",
            report.code, report.payload, report.description
        );
        std::process::exit(self.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    /// Unwinds instead of exiting so the report can be inspected.
    struct PanickingReporter;

    impl ErrorReporter for PanickingReporter {
        fn abort(&self, report: &ErrorReport) -> ! {
            panic::panic_any(report.clone())
        }
    }

    #[test]
    fn test_abort_carries_report() {
        let report = ErrorReport {
            code: 13,
            description: "band radius 9 exceeds the grid limit 4".to_string(),
            payload: 9,
        };
        let caught = panic::catch_unwind(|| PanickingReporter.abort(&report)).unwrap_err();
        let got = caught.downcast_ref::<ErrorReport>().unwrap();
        assert_eq!(got, &report);
    }
}
