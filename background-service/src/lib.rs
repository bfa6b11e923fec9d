//! Scheduled monitoring: one fetch-classify-store pipeline and the service
//! that runs it on an interval.

pub mod monitor;
pub mod pipeline;

pub use monitor::{CycleRunner, MonitorService};
pub use pipeline::{is_urgent, CycleReport, Pipeline, RedditPipeline};
