//! API Request and Response Types
//!
//! HTTP bodies and query parameters. Domain types from `compass-core` are
//! reused directly where their JSON shape already matches the wire contract.

mod analysis;
mod monitoring;

pub use analysis::{
    AnalyzeImageRequest, AnalyzeTextRequest, FeatureListResponse, ImageAnalysisResponse,
    TextAnalysisResponse, TextInput,
};
pub use monitoring::{AlertListResponse, AlertQuery, MetricsQuery, MetricsQueryResponse};
