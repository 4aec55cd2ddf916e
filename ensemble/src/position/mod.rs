//! Position summaries: evaluator features, phase and bucket classification

pub mod bucket;
pub mod features;
pub mod phase;

pub use bucket::{BucketKey, BucketKeyBuilder, BucketKeyError, BUCKET_DELIMITER};
pub use features::{MaterialBalance, PositionEvaluator, PositionFeatures, SharedContext};
pub use phase::{Phase, PhaseClassifier, PhaseThresholds};
