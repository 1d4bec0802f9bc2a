//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn FillProgressCallback>`] via
//! [`crate::config::FillConfigBuilder::progress_callback`] to follow a run
//! as it moves through [`Stage`]s. The CLI drives a spinner from it; a
//! server could forward the events to a job record.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pafill::{FillConfig, FillProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl FillProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, detail: &str) {
//!         eprintln!("{stage}: {detail}");
//!     }
//! }
//!
//! let config = FillConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn FillProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the orchestrator at stage boundaries.
///
/// All methods default to no-ops. Events for one run arrive in order from a
/// single task, but one callback may be shared by concurrent runs.
pub trait FillProgressCallback: Send + Sync {
    /// A stage is about to start.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A stage finished; `detail` is a short human summary ("12 fields").
    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// A stage failed; no further events follow for this run.
    fn on_stage_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation; the orchestrator reports to it when
/// [`crate::config::FillConfig::progress_callback`] is `None`.
pub struct NoopProgressCallback;

impl FillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FillConfig`].
pub type ProgressCallback = Arc<dyn FillProgressCallback>;
