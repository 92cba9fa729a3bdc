pub mod alerts;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod trend;

pub use alerts::{evaluate_alert, AlertEvent, AlertSeverity, SessionRefs};
pub use config::{AlertGeneration, AnalysisConfig};
pub use metrics::FrameMetrics;
pub use pipeline::{ingest_session, FrameRecord, IngestOutcome};
pub use trend::{downsample, TrendPoint};
