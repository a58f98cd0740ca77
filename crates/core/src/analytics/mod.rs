pub mod align;
pub mod percentile;
pub mod pipeline;

pub use align::align;
pub use percentile::rolling_percentile;
pub use pipeline::{AnalyticsPipeline, PipelineConfig};
