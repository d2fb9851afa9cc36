pub mod metrics;
pub mod sampler;
pub mod snapshot;

pub use metrics::{MetricsSource, ProcessMemory};
pub use sampler::{Sampler, SamplerConfig};
pub use snapshot::{MetricsSnapshot, SharedSnapshot};
