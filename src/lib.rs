//! Random Forest core for pixel classification.
//!
//! Trains an ensemble of entropy-gain decision trees over packed columnar
//! feature tables, classifies instances in parallel batches, and estimates
//! per-feature importance by permutation. Training is bit-for-bit
//! reproducible for a fixed seed regardless of thread count: per-tree seeds
//! are drawn from a master generator in tree order before any parallel
//! dispatch.
//!
//! The crate deliberately stops at the feature-table boundary: image I/O,
//! tiling, and annotation extraction are collaborators that construct a
//! [`FeatureReader`] and consume plain label/probability arrays and
//! [`Progress`] callbacks.

mod error;
mod forest;
mod importance;
mod node;
mod progress;
mod reader;
mod serialize;
mod stats;
mod tree;

pub use error::ForestError;
pub use forest::{RandomForest, RandomForestConfig};
pub use importance::PermutationImportance;
pub use node::{Node, NodeIndex};
pub use progress::{ListenerId, Progress, ProgressListener};
pub use reader::{ByteReader, FeatureReader, ShortReader};
pub use tree::RandomTree;
