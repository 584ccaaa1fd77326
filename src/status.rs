//! Exit status codes for the CLI
//!
//! restchain follows standard Unix exit code conventions:
//! - 0: The pipeline finished with SUCCESS
//! - 1: The pipeline FAILED, or it could not be loaded or started

use std::process::{ExitCode, Termination};

use crate::pipeline::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Error = 1,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Only a successful run exits with 0.
    pub fn from_state(state: PipelineState) -> Self {
        match state {
            PipelineState::Success => ExitStatus::Success,
            _ => ExitStatus::Error,
        }
    }
}
