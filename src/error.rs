use std::path::PathBuf;

/// Errors from Random Forest training, inference, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when num_trees is zero.
    #[error("num_trees must be at least 1, got {num_trees}")]
    InvalidTreeCount {
        /// The invalid num_trees value provided.
        num_trees: usize,
    },

    /// Returned when no training instances are supplied.
    #[error("no training data supplied")]
    NoTrainingData,

    /// Returned when bag_size_percent is not in (0.0, 100.0].
    #[error("bag_size_percent must be in (0.0, 100.0], got {percent}")]
    InvalidBagSize {
        /// The invalid bag_size_percent value provided.
        percent: f64,
    },

    /// Returned when the bootstrap sample resolves to zero instances.
    #[error("bag of {percent}% of {num_instances} instances is empty")]
    EmptyBag {
        /// The configured bag_size_percent.
        percent: f64,
        /// The number of training instances supplied.
        num_instances: usize,
    },

    /// Returned when a class label is outside [0, num_classes).
    #[error("instance {instance} has class value {class_value}, expected < {num_classes}")]
    ClassValueOutOfRange {
        /// The zero-based instance index.
        instance: usize,
        /// The offending class label.
        class_value: usize,
        /// The number of classes the forest was configured for.
        num_classes: usize,
    },

    /// Returned when a single tree fails during ensemble construction.
    #[error("failed to build tree {tree_index} after {elapsed_ms}ms")]
    TreeBuild {
        /// Index of the tree whose build task failed.
        tree_index: usize,
        /// Wall-clock milliseconds spent in the failed task.
        elapsed_ms: u128,
        /// The underlying build error.
        source: Box<ForestError>,
    },

    /// Returned when the worker thread pool cannot be constructed.
    #[error("failed to build worker thread pool")]
    ThreadPool {
        /// The underlying rayon error.
        #[from]
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when a reader's feature count does not match the forest's.
    #[error("reader has {got} features, forest was trained on {expected}")]
    FeatureCountMismatch {
        /// The feature count the forest was trained on.
        expected: usize,
        /// The feature count of the supplied reader.
        got: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
