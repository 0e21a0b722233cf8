//! Run-level orchestration: stage execution, progress persistence, metrics,
//! artifact I/O, and run discovery.

pub mod manifest;
pub mod metrics;
pub mod outputs;
pub mod runner;
pub mod status;

pub use manifest::{
    MANIFEST_SCHEMA_VERSION, ManifestError, RunManifest, Stage, StepProgress, StepStatus, now_iso,
};
pub use metrics::{METRICS_SCHEMA_VERSION, MetricsError, RunMetrics};
pub use outputs::{OutputError, load_messages, write_messages_jsonl, write_preview};
pub use runner::{PipelineError, RunReport, run_pipeline};
pub use status::{RunState, RunSummary, list_runs, load_run_summary};
