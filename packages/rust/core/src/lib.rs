//! Research orchestration: the company pipeline, person research, CRM
//! enrichment seam, and progress reporting.

pub mod enrichment;
mod person;
pub mod pipeline;
pub mod progress;

pub use enrichment::{CrmEnricher, NoCrm};
pub use pipeline::ResearchPipeline;
pub use progress::{ProgressReporter, SilentProgress};
