pub mod resample;
pub mod trend;

pub use resample::resample;
pub use resample::Bucket;
pub use resample::BucketAggregates;
pub use resample::ResampledSeries;
pub use resample::ResampleInterval;
pub use trend::analyze_trend;
pub use trend::TrendDirection;
pub use trend::TrendResult;
