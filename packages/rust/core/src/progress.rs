//! Progress reporting for pipeline consumers.

use prospector_shared::{CompanyResult, RunStatus};

/// Progress callback for reporting pipeline status. Every transition is
/// also persisted to the run record, so this is purely for live display.
pub trait ProgressReporter: Send + Sync {
    /// Called when a company enters a new phase.
    fn phase(&self, company: &str, status: RunStatus, pct: u32, msg: &str);
    /// Called when a company's result is final (success or failure).
    fn company_done(&self, result: &CompanyResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _company: &str, _status: RunStatus, _pct: u32, _msg: &str) {}
    fn company_done(&self, _result: &CompanyResult) {}
}
