pub mod dataset;
pub mod engine;
pub mod features;
pub mod insight;
pub mod metrics;
pub mod weather;

pub use dataset::*;
pub use engine::*;
pub use features::*;
pub use insight::*;
pub use metrics::*;
pub use weather::*;
