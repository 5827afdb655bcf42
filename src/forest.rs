//! Random Forest training and batched inference with deterministic
//! parallel tree construction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::progress::Progress;
use crate::reader::FeatureReader;
use crate::stats;
use crate::tree::{RandomTree, TreeGrowth};

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                | Default                              |
/// |--------------------------|--------------------------------------|
/// | `min_instances_per_leaf` | 1                                    |
/// | `attributes_per_split`   | 0 (`log2(numFeatures - 1) + 1`)      |
/// | `max_depth`              | 0 (unlimited)                        |
/// | `bag_size_percent`       | 100.0                                |
/// | `num_threads`            | 0 (available hardware parallelism)   |
/// | `seed`                   | 42                                   |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    num_trees: usize,
    min_instances_per_leaf: usize,
    attributes_per_split: usize,
    max_depth: usize,
    bag_size_percent: f64,
    num_threads: usize,
    seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `num_trees` is zero.
    pub fn new(num_trees: usize) -> Result<Self, ForestError> {
        if num_trees == 0 {
            return Err(ForestError::InvalidTreeCount { num_trees });
        }
        Ok(Self {
            num_trees,
            min_instances_per_leaf: 1,
            attributes_per_split: 0,
            max_depth: 0,
            bag_size_percent: 100.0,
            num_threads: 0,
            seed: 42,
        })
    }

    /// Set the minimum instance weight per prospective leaf.
    #[must_use]
    pub fn with_min_instances_per_leaf(mut self, min_instances_per_leaf: usize) -> Self {
        self.min_instances_per_leaf = min_instances_per_leaf;
        self
    }

    /// Set the number of random attributes evaluated per split.
    ///
    /// 0 resolves to `log2(numFeatures - 1) + 1`; values at or above the
    /// non-class attribute count evaluate every attribute.
    #[must_use]
    pub fn with_attributes_per_split(mut self, attributes_per_split: usize) -> Self {
        self.attributes_per_split = attributes_per_split;
        self
    }

    /// Set the maximum tree depth. 0 means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the bootstrap sample size as a percentage of the training set.
    #[must_use]
    pub fn with_bag_size_percent(mut self, bag_size_percent: f64) -> Self {
        self.bag_size_percent = bag_size_percent;
        self
    }

    /// Set the worker pool size. 0 resolves to available parallelism.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Return the configured attributes-per-split (0 = heuristic).
    #[must_use]
    pub fn attributes_per_split(&self) -> usize {
        self.attributes_per_split
    }

    /// Return the maximum depth (0 = unlimited).
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the bootstrap sample percentage.
    #[must_use]
    pub fn bag_size_percent(&self) -> f64 {
        self.bag_size_percent
    }

    /// Return the configured thread count (0 = available parallelism).
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a Random Forest over the given instance subset of the reader.
    ///
    /// Each completed tree emits a `(trees_completed, num_trees, message)`
    /// progress event from its worker thread.
    ///
    /// # Errors
    ///
    /// | Variant                                | When                                        |
    /// |----------------------------------------|---------------------------------------------|
    /// | [`ForestError::NoTrainingData`]        | `instance_indices` is empty                 |
    /// | [`ForestError::InvalidBagSize`]        | `bag_size_percent` is not in (0, 100]       |
    /// | [`ForestError::EmptyBag`]              | the bootstrap sample resolves to 0 draws    |
    /// | [`ForestError::ClassValueOutOfRange`]  | a class label is ≥ the reader's class count |
    /// | [`ForestError::TreeBuild`]             | a tree's build task failed                  |
    /// | [`ForestError::ThreadPool`]            | the worker pool could not be constructed    |
    pub fn fit<R: FeatureReader + Sync>(
        &self,
        reader: &R,
        instance_indices: &[usize],
        progress: &Progress,
    ) -> Result<RandomForest, ForestError> {
        RandomForest::fit(self, reader, instance_indices, progress)
    }
}

/// Resolve a thread-count setting: 0 means available hardware parallelism.
fn resolve_threads(num_threads: usize) -> usize {
    if num_threads > 0 {
        num_threads
    } else {
        std::thread::available_parallelism().map_or(1, usize::from)
    }
}

/// Resolve the attributes-per-split setting against a feature count.
fn resolve_attributes_per_split(configured: usize, num_features: usize) -> usize {
    if configured >= num_features {
        num_features
    } else if configured < 1 {
        let non_class = num_features.saturating_sub(1).max(1);
        (non_class as f64).log2() as usize + 1
    } else {
        configured
    }
}

/// A trained Random Forest ensemble.
///
/// Owns exactly `num_trees` trees, populated once during training and
/// immutable afterward; inference shares them read-only across workers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<RandomTree>,
    pub(crate) num_classes: usize,
    pub(crate) num_features: usize,
    pub(crate) attributes_per_split: usize,
    pub(crate) max_depth: usize,
    #[serde(skip, default)]
    num_threads: usize,
}

impl RandomForest {
    #[instrument(skip_all, fields(num_trees = config.num_trees, num_instances = instance_indices.len()))]
    fn fit<R: FeatureReader + Sync>(
        config: &RandomForestConfig,
        reader: &R,
        instance_indices: &[usize],
        progress: &Progress,
    ) -> Result<RandomForest, ForestError> {
        if instance_indices.is_empty() {
            return Err(ForestError::NoTrainingData);
        }
        if config.bag_size_percent <= 0.0 || config.bag_size_percent > 100.0 {
            return Err(ForestError::InvalidBagSize {
                percent: config.bag_size_percent,
            });
        }

        let bag_size =
            (instance_indices.len() as f64 * config.bag_size_percent / 100.0).floor() as usize;
        if bag_size == 0 {
            return Err(ForestError::EmptyBag {
                percent: config.bag_size_percent,
                num_instances: instance_indices.len(),
            });
        }

        let growth = TreeGrowth {
            min_instances: config.min_instances_per_leaf,
            attributes_per_split: resolve_attributes_per_split(
                config.attributes_per_split,
                reader.num_features(),
            ),
            max_depth: config.max_depth,
            num_classes: reader.num_classes(),
        };
        let num_threads = resolve_threads(config.num_threads);
        let num_trees = config.num_trees;

        info!(
            num_trees,
            num_classes = growth.num_classes,
            num_features = reader.num_features(),
            attributes_per_split = growth.attributes_per_split,
            bag_size,
            num_threads,
            "training random forest"
        );

        // Seeds are drawn in ascending tree order from the master generator
        // before any parallel dispatch, so the ensemble is bit-identical for
        // a fixed seed regardless of thread count or scheduling.
        let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
        let tree_seeds: Vec<(u64, u64)> = (0..num_trees)
            .map(|_| (master_rng.r#gen(), master_rng.r#gen()))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        let trees_built = AtomicUsize::new(0);

        // Every task runs to completion; the first failure (by tree index)
        // is reported only after the whole batch has settled.
        let results: Vec<Result<RandomTree, ForestError>> = pool.install(|| {
            tree_seeds
                .into_par_iter()
                .enumerate()
                .map(|(tree_index, (bag_seed, tree_seed))| {
                    let start = Instant::now();
                    let bag = bootstrap_sample(instance_indices, bag_size, bag_seed);
                    match RandomTree::build(reader, &bag, tree_seed, &growth) {
                        Ok(tree) => {
                            let built = trees_built.fetch_add(1, Ordering::SeqCst) + 1;
                            progress.emit(
                                built,
                                num_trees,
                                &format!(
                                    "Built tree {tree_index} in {}ms",
                                    start.elapsed().as_millis()
                                ),
                            );
                            Ok(tree)
                        }
                        Err(source) => Err(ForestError::TreeBuild {
                            tree_index,
                            elapsed_ms: start.elapsed().as_millis(),
                            source: Box::new(source),
                        }),
                    }
                })
                .collect()
        });

        let trees: Vec<RandomTree> = results.into_iter().collect::<Result<_, _>>()?;

        debug!(num_trees = trees.len(), "random forest training complete");

        Ok(RandomForest {
            trees,
            num_classes: growth.num_classes,
            num_features: reader.num_features(),
            attributes_per_split: growth.attributes_per_split,
            max_depth: config.max_depth,
            num_threads,
        })
    }

    /// Aggregate class distribution for a single instance.
    ///
    /// Sums the per-tree distributions; an all-zero aggregate (every tree
    /// routed into an empty subtree) is returned unnormalized.
    #[must_use]
    pub fn distribution_for_instance<R: FeatureReader>(
        &self,
        reader: &R,
        instance: usize,
    ) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.num_classes];
        for tree in &self.trees {
            if let Some(distribution) = tree.distribution_for(reader, instance) {
                for (sum, p) in sums.iter_mut().zip(distribution) {
                    *sum += p;
                }
            }
        }
        if !stats::eq(stats::sum(&sums), 0.0) {
            stats::normalize(&mut sums);
        }
        sums
    }

    /// Aggregate class distributions for every instance of the reader,
    /// computed in parallel batches.
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                                     |
    /// |-----------------------------------------|------------------------------------------|
    /// | [`ForestError::FeatureCountMismatch`]   | reader feature count differs from training |
    /// | [`ForestError::ThreadPool`]             | the worker pool could not be constructed |
    #[instrument(skip_all, fields(num_instances = reader.num_instances()))]
    pub fn distributions_for_instances<R: FeatureReader + Sync>(
        &self,
        reader: &R,
        progress: &Progress,
    ) -> Result<Vec<Vec<f64>>, ForestError> {
        self.check_reader(reader)?;
        let num_instances = reader.num_instances();
        // Stride of at least 1 so small batches cannot divide by zero.
        let stride = (num_instances / 100).max(1);
        let completed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()?;
        let distributions = pool.install(|| {
            (0..num_instances)
                .into_par_iter()
                .map(|instance| {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % stride == 0 {
                        progress.emit(done, num_instances, "Computing class distributions");
                    }
                    self.distribution_for_instance(reader, instance)
                })
                .collect()
        });
        Ok(distributions)
    }

    /// Predict the class of every listed instance, in parallel batches.
    ///
    /// The class is the argmax of the aggregate distribution; ties break
    /// toward the lowest class index.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RandomForest::distributions_for_instances`].
    #[instrument(skip_all, fields(num_instances = instance_indices.len()))]
    pub fn classify<R: FeatureReader + Sync>(
        &self,
        reader: &R,
        instance_indices: &[usize],
        progress: &Progress,
    ) -> Result<Vec<usize>, ForestError> {
        self.check_reader(reader)?;
        let num_instances = instance_indices.len();
        let stride = (num_instances / 100).max(1);
        let completed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()?;
        let classes = pool.install(|| {
            instance_indices
                .into_par_iter()
                .map(|&instance| {
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % stride == 0 {
                        progress.emit(done, num_instances, "Classifying instances");
                    }
                    let sums = self.distribution_for_instance(reader, instance);
                    stats::max_index(&sums)
                })
                .collect()
        });
        Ok(classes)
    }

    /// Predict the class of every instance of the reader.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RandomForest::classify`].
    pub fn classify_all<R: FeatureReader + Sync>(
        &self,
        reader: &R,
        progress: &Progress,
    ) -> Result<Vec<usize>, ForestError> {
        let all: Vec<usize> = (0..reader.num_instances()).collect();
        self.classify(reader, &all, progress)
    }

    fn check_reader<R: FeatureReader>(&self, reader: &R) -> Result<(), ForestError> {
        if reader.num_features() != self.num_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.num_features,
                got: reader.num_features(),
            });
        }
        Ok(())
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Return the feature count the forest was trained on.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Return the resolved attributes-per-split used during training.
    #[must_use]
    pub fn attributes_per_split(&self) -> usize {
        self.attributes_per_split
    }

    /// Return the inference worker count (available parallelism when the
    /// forest was deserialized).
    #[must_use]
    pub fn num_threads(&self) -> usize {
        resolve_threads(self.num_threads)
    }
}

/// Draw `bag_size` instances with replacement, mapped through the caller's
/// instance subset.
fn bootstrap_sample(instance_indices: &[usize], bag_size: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..bag_size)
        .map(|_| instance_indices[rng.gen_range(0..instance_indices.len())])
        .collect()
}
