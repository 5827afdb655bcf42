//! Model persistence via bincode with a versioned envelope.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::RandomForest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// The serialized forest.
    forest: RandomForest,
}

impl RandomForest {
    /// Save the trained forest to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            forest: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|source| ForestError::SerializeModel { source })?;

        debug!(num_bytes = bytes.len(), "model encoded");

        std::fs::write(path, bytes).map_err(|source| ForestError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(num_trees = self.num_trees(), "model saved");
        Ok(())
    }

    /// Load a trained forest from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<RandomForest, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|source| ForestError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|source| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        info!(num_trees = envelope.forest.num_trees(), "model loaded");
        Ok(envelope.forest)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::forest::RandomForestConfig;
    use crate::progress::Progress;
    use crate::reader::ByteReader;

    fn fitted_forest() -> (crate::forest::RandomForest, ByteReader, Vec<usize>) {
        let reader = ByteReader::new(
            vec![
                (0..16).map(|i| (i % 4) as u8).collect(),
                vec![0; 16],
                (0..16).map(|i| (i % 4) as u8).collect(),
            ],
            2,
        );
        let indices: Vec<usize> = (0..16).collect();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .with_seed(13)
            .fit(&reader, &indices, &Progress::default())
            .unwrap();
        (forest, reader, indices)
    }

    #[test]
    fn save_load_roundtrip_preserves_model() {
        let (forest, reader, indices) = fitted_forest();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");

        forest.save(&path).unwrap();
        let loaded = crate::forest::RandomForest::load(&path).unwrap();

        assert_eq!(loaded.trees, forest.trees);
        assert_eq!(loaded.num_classes(), forest.num_classes());
        let original = forest.classify(&reader, &indices, &Progress::default()).unwrap();
        let reloaded = loaded.classify(&reader, &indices, &Progress::default()).unwrap();
        assert_eq!(original, reloaded);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = crate::forest::RandomForest::load("/nonexistent/model.bin");
        assert!(matches!(
            result,
            Err(crate::error::ForestError::ReadModel { .. })
        ));
    }
}
