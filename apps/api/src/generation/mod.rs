// Pipeline Orchestrator: normalizer -> template cache -> document renderer,
// plus the HTTP handlers that front it.

pub mod handlers;
pub mod pipeline;

pub use pipeline::{CvPipeline, PipelineSettings};
