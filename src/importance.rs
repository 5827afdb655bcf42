//! Permutation feature importance and importance-driven feature selection.
//!
//! Importance of an attribute is measured by shuffling its values across
//! instances and counting how many classifications the shuffle breaks.

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::progress::Progress;
use crate::reader::FeatureReader;

/// Permutation importance calculator with its own seeded generator.
///
/// Per-attribute shuffle seeds are drawn from the generator in ascending
/// attribute order, so scores are reproducible for a fixed seed.
#[derive(Debug)]
pub struct PermutationImportance {
    rng: ChaCha8Rng,
}

impl PermutationImportance {
    /// Create a calculator seeded for reproducible shuffles.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Per-attribute importance scores over the given instance subset.
    ///
    /// Each score is the fraction of instances whose predicted class changes
    /// away from the true class when that attribute is shuffled; the class
    /// column's slot is NaN.
    ///
    /// # Errors
    ///
    /// Propagates inference failures from [`RandomForest::classify`].
    #[instrument(skip_all, fields(num_features = reader.num_features()))]
    pub fn calculate<R: FeatureReader + Sync>(
        &mut self,
        forest: &RandomForest,
        reader: &R,
        instance_indices: &[usize],
    ) -> Result<Vec<f64>, ForestError> {
        let mut scores = Vec::with_capacity(reader.num_features());
        for attribute in 0..reader.num_features() {
            if attribute == reader.class_index() {
                scores.push(f64::NAN);
                continue;
            }
            let scrambled = ScrambledReader::new(reader, attribute, self.rng.r#gen());
            let predicted = forest.classify(&scrambled, instance_indices, &Progress::default())?;
            let incorrect = predicted
                .iter()
                .zip(instance_indices)
                .filter(|&(&class, &instance)| class != reader.class_value(instance))
                .count();
            let score = incorrect as f64 / instance_indices.len() as f64;
            debug!(attribute, score, "permutation importance");
            scores.push(score);
        }
        Ok(scores)
    }

    /// Select the `max_features` most important attributes.
    ///
    /// Attributes strictly above the importance value at the selection
    /// boundary are always kept; attributes tied exactly at the boundary
    /// compete for the remaining slots by uniform random sampling without
    /// replacement, so boundary ties are fair rather than order-dependent.
    /// Returns attribute indices, most important first.
    ///
    /// # Errors
    ///
    /// Propagates inference failures from [`PermutationImportance::calculate`].
    pub fn select_features<R: FeatureReader + Sync>(
        &mut self,
        max_features: usize,
        forest: &RandomForest,
        reader: &R,
        instance_indices: &[usize],
        mut logger: Option<&mut dyn FnMut(&str)>,
    ) -> Result<Vec<usize>, ForestError> {
        if max_features == 0 {
            return Ok(Vec::new());
        }
        let importance = self.calculate(forest, reader, instance_indices)?;

        let mut ranked: Vec<usize> = (0..reader.num_features())
            .filter(|&attribute| attribute != reader.class_index())
            .collect();
        // Stable sort: equally important attributes stay in index order
        // until the boundary lottery below.
        ranked.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]));

        if let Some(log) = logger.as_mut() {
            log("Feature importance:");
            for &attribute in &ranked {
                log(&format!("  attribute {attribute}: {}", importance[attribute]));
            }
        }

        if ranked.len() <= max_features {
            return Ok(ranked);
        }

        let boundary = importance[ranked[max_features - 1]];
        let mut selected: Vec<usize> = ranked
            .iter()
            .copied()
            .filter(|&attribute| importance[attribute] > boundary)
            .collect();

        let mut tied: Vec<usize> = ranked
            .iter()
            .copied()
            .filter(|&attribute| importance[attribute] == boundary)
            .collect();
        tied.shuffle(&mut self.rng);
        tied.truncate(max_features - selected.len());
        selected.extend(tied);

        info!(
            max_features,
            selected = selected.len(),
            "selected attributes by permutation importance"
        );
        Ok(selected)
    }
}

/// A view over a reader with one attribute's values shuffled across
/// instances via a fixed permutation.
struct ScrambledReader<'a, R> {
    reader: &'a R,
    scrambled_attribute: usize,
    permutation: Vec<usize>,
}

impl<'a, R: FeatureReader> ScrambledReader<'a, R> {
    fn new(reader: &'a R, scrambled_attribute: usize, seed: u64) -> Self {
        let mut permutation: Vec<usize> = (0..reader.num_instances()).collect();
        permutation.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        Self {
            reader,
            scrambled_attribute,
            permutation,
        }
    }
}

impl<R: FeatureReader> FeatureReader for ScrambledReader<'_, R> {
    fn num_instances(&self) -> usize {
        self.reader.num_instances()
    }

    fn num_features(&self) -> usize {
        self.reader.num_features()
    }

    fn class_index(&self) -> usize {
        self.reader.class_index()
    }

    fn num_classes(&self) -> usize {
        self.reader.num_classes()
    }

    fn value(&self, instance: usize, attribute: usize) -> f64 {
        if attribute == self.scrambled_attribute {
            self.reader.value(self.permutation[instance], attribute)
        } else {
            self.reader.value(instance, attribute)
        }
    }

    fn class_value(&self, instance: usize) -> usize {
        self.reader.class_value(instance)
    }

    fn weight(&self, instance: usize) -> f64 {
        self.reader.weight(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::{PermutationImportance, ScrambledReader};
    use crate::forest::RandomForestConfig;
    use crate::progress::Progress;
    use crate::reader::{ByteReader, FeatureReader};

    /// feature0 cycles 0..=7, feature1 is constant, class = feature0 mod 2.
    fn scenario_table() -> ByteReader {
        let feature0: Vec<u8> = (0..48).map(|i| (i % 8) as u8).collect();
        let class: Vec<u8> = (0..48).map(|i| (i % 2) as u8).collect();
        ByteReader::new(vec![feature0, vec![0; 48], class], 2)
    }

    #[test]
    fn informative_attribute_outranks_constant() {
        let reader = scenario_table();
        let indices: Vec<usize> = (0..48).collect();
        let forest = RandomForestConfig::new(20)
            .unwrap()
            .with_seed(42)
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let scores = PermutationImportance::new(42)
            .calculate(&forest, &reader, &indices)
            .unwrap();
        assert!(
            scores[0] > scores[1],
            "informative {} <= constant {}",
            scores[0],
            scores[1]
        );
        assert!(scores[2].is_nan());
    }

    #[test]
    fn scores_reproducible_for_fixed_seed() {
        let reader = scenario_table();
        let indices: Vec<usize> = (0..48).collect();
        let forest = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(7)
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let first = PermutationImportance::new(5)
            .calculate(&forest, &reader, &indices)
            .unwrap();
        let second = PermutationImportance::new(5)
            .calculate(&forest, &reader, &indices)
            .unwrap();
        assert_eq!(first[0], second[0]);
        assert_eq!(first[1], second[1]);
    }

    #[test]
    fn scrambled_reader_redirects_only_one_attribute() {
        let reader = scenario_table();
        let scrambled = ScrambledReader::new(&reader, 0, 99);

        // The untouched attribute and class column pass through.
        for instance in 0..48 {
            assert_eq!(scrambled.value(instance, 1), reader.value(instance, 1));
            assert_eq!(scrambled.class_value(instance), reader.class_value(instance));
        }
        // The scrambled column is a permutation of the original values.
        let mut values: Vec<f64> = (0..48).map(|i| scrambled.value(i, 0)).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let mut expected: Vec<f64> = (0..48).map(|i| f64::from(i % 8)).collect();
        expected.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(values, expected);
    }

    #[test]
    fn informative_attribute_always_selected() {
        let reader = scenario_table();
        let indices: Vec<usize> = (0..48).collect();
        let forest = RandomForestConfig::new(20)
            .unwrap()
            .with_seed(42)
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let selected = PermutationImportance::new(42)
            .select_features(1, &forest, &reader, &indices, None)
            .unwrap();
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn zero_max_features_selects_nothing() {
        let reader = scenario_table();
        let indices: Vec<usize> = (0..48).collect();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let selected = PermutationImportance::new(1)
            .select_features(0, &forest, &reader, &indices, None)
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn eight_instance_parity_scenario() {
        let reader = ByteReader::new(
            vec![
                vec![0, 1, 2, 3, 4, 5, 6, 7],
                vec![0; 8],
                vec![0, 1, 0, 1, 0, 1, 0, 1],
            ],
            2,
        );
        let indices: Vec<usize> = (0..8).collect();
        let forest = RandomForestConfig::new(20)
            .unwrap()
            .with_seed(42)
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let scores = PermutationImportance::new(42)
            .calculate(&forest, &reader, &indices)
            .unwrap();
        assert!(scores[0] > scores[1]);
        assert!(scores[2].is_nan());
    }

    #[test]
    fn boundary_ties_filled_without_duplicates() {
        // Four constant attributes: every importance ties at the boundary.
        let reader = ByteReader::new(
            vec![
                vec![3; 12],
                vec![3; 12],
                vec![3; 12],
                vec![3; 12],
                (0..12).map(|i| (i % 2) as u8).collect(),
            ],
            4,
        );
        let indices: Vec<usize> = (0..12).collect();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let selected = PermutationImportance::new(3)
            .select_features(2, &forest, &reader, &indices, None)
            .unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected[0] != selected[1]);
        assert!(selected.iter().all(|&attribute| attribute < 4));
    }

    #[test]
    fn logger_receives_ranked_listing() {
        let reader = scenario_table();
        let indices: Vec<usize> = (0..48).collect();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&reader, &indices, &Progress::default())
            .unwrap();

        let mut lines = Vec::new();
        let mut logger = |line: &str| lines.push(line.to_string());
        PermutationImportance::new(1)
            .select_features(1, &forest, &reader, &indices, Some(&mut logger))
            .unwrap();
        // Header plus one line per non-class attribute.
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("importance"));
    }
}
