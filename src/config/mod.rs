pub mod pipeline;

pub use pipeline::{clamp_int, LeadRequest, Pacing, PipelineConfig, SourcePolicy};
