//! A single random decision tree: recursive entropy-gain training over a
//! [`FeatureReader`] and read-only inference.

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::error::ForestError;
use crate::node::{Node, NodeIndex};
use crate::reader::FeatureReader;
use crate::stats;

/// Growth parameters resolved by the forest before tree construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeGrowth {
    /// Minimum weight per prospective leaf; a node below twice this becomes
    /// a leaf.
    pub(crate) min_instances: usize,
    /// Number of random attributes to evaluate per split, at least 1.
    pub(crate) attributes_per_split: usize,
    /// Maximum depth, 0 for unlimited.
    pub(crate) max_depth: usize,
    /// Number of classes; class labels must be below this.
    pub(crate) num_classes: usize,
}

/// A trained decision tree, immutable after construction.
///
/// Stored as an arena-based `Vec<Node>` rooted at index 0. Safe to share
/// read-only across inference workers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomTree {
    nodes: Vec<Node>,
}

impl RandomTree {
    /// Train a tree on a bootstrap sample against the reader.
    ///
    /// The seed fixes the attribute-window shuffle and every per-node
    /// attribute draw, so an identical `(reader, instance_indices, seed)`
    /// triple always yields an identical tree.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::ClassValueOutOfRange`] when an instance's class
    /// label is not below the configured class count.
    pub(crate) fn build<R: FeatureReader>(
        reader: &R,
        instance_indices: &[usize],
        seed: u64,
        growth: &TreeGrowth,
    ) -> Result<RandomTree, ForestError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Attribute window: every non-class attribute, randomly ordered.
        let mut window: Vec<usize> = (0..reader.num_features())
            .filter(|&attribute| attribute != reader.class_index())
            .collect();
        window.shuffle(&mut rng);

        // Initial weighted class counts over the sample.
        let mut class_counts = vec![0.0f64; growth.num_classes];
        for &instance in instance_indices {
            let class_value = reader.class_value(instance);
            if class_value >= growth.num_classes {
                return Err(ForestError::ClassValueOutOfRange {
                    instance,
                    class_value,
                    num_classes: growth.num_classes,
                });
            }
            class_counts[class_value] += reader.weight(instance);
        }

        let mut nodes = Vec::new();
        build_node(
            reader,
            instance_indices,
            class_counts,
            &mut window,
            &mut rng,
            0,
            growth,
            &mut nodes,
        );

        trace!(num_nodes = nodes.len(), "tree built");
        Ok(RandomTree { nodes })
    }

    /// Class probability distribution for one instance, or `None` when the
    /// instance routes into an empty subtree with no stored fallback.
    pub fn distribution_for<R: FeatureReader>(
        &self,
        reader: &R,
        instance: usize,
    ) -> Option<&[f64]> {
        self.node_distribution(0, reader, instance)
    }

    fn node_distribution<R: FeatureReader>(
        &self,
        index: usize,
        reader: &R,
        instance: usize,
    ) -> Option<&[f64]> {
        match &self.nodes[index] {
            Node::Leaf { normalized, .. } => normalized.as_deref(),
            Node::Split {
                attribute,
                threshold,
                left,
                right,
                normalized,
                ..
            } => {
                let child = if reader.value(instance, *attribute) < *threshold {
                    left
                } else {
                    right
                };
                // Empty subtrees bubble None up to the nearest fallback.
                self.node_distribution(child.index(), reader, instance)
                    .or(normalized.as_deref())
            }
        }
    }

    /// Return the total number of nodes in the tree.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the maximum depth of the tree; a single-leaf tree has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut queue = std::collections::VecDeque::from([(0usize, 0usize)]);
        while let Some((index, depth)) = queue.pop_front() {
            match &self.nodes[index] {
                Node::Leaf { .. } => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), depth + 1));
                    queue.push_back((right.index(), depth + 1));
                }
            }
        }
        max_depth
    }
}

/// Push a leaf holding the raw counts and their normalized form.
fn push_leaf(nodes: &mut Vec<Node>, class_counts: Vec<f64>) -> NodeIndex {
    let mut normalized = class_counts.clone();
    stats::normalize(&mut normalized);
    let index = nodes.len();
    nodes.push(Node::Leaf {
        distribution: Some(class_counts),
        normalized: Some(normalized),
    });
    NodeIndex::new(index)
}

/// Recursively grow the subtree for one instance subset.
///
/// `class_counts` is the weighted class distribution of `instance_indices`,
/// carried down from the winning split so it is never recomputed.
#[allow(clippy::too_many_arguments)]
fn build_node<R: FeatureReader>(
    reader: &R,
    instance_indices: &[usize],
    class_counts: Vec<f64>,
    window: &mut [usize],
    rng: &mut ChaCha8Rng,
    depth: usize,
    growth: &TreeGrowth,
    nodes: &mut Vec<Node>,
) -> NodeIndex {
    // No training instances: an empty leaf with no distribution.
    if instance_indices.is_empty() {
        let index = nodes.len();
        nodes.push(Node::Leaf {
            distribution: None,
            normalized: None,
        });
        return NodeIndex::new(index);
    }

    // Too light, pure, or at the depth limit: a populated leaf.
    let total_weight = stats::sum(&class_counts);
    let too_light = total_weight < 2.0 * growth.min_instances as f64;
    let pure = stats::eq(class_counts[stats::max_index(&class_counts)], total_weight);
    let at_depth_limit = growth.max_depth > 0 && depth >= growth.max_depth;
    if too_light || pure || at_depth_limit {
        return push_leaf(nodes, class_counts);
    }

    // Scan random attributes from the window (swap-removal, without
    // replacement). The budget guarantees at least `attributes_per_split`
    // draws, but the scan keeps going until some draw shows positive gain
    // or the window is exhausted.
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = f64::NEG_INFINITY;
    let mut best_attribute = 0;
    let mut best_sides: Option<[Vec<f64>; 2]> = None;

    let mut window_size = window.len();
    let mut budget = growth.attributes_per_split as i64;
    let mut gain_found = false;

    while window_size > 0 && {
        let in_budget = budget > 0;
        budget -= 1;
        in_budget || !gain_found
    } {
        let chosen = rng.gen_range(0..window_size);
        let attribute = window[chosen];
        window.swap(chosen, window_size - 1);
        window_size -= 1;

        let (threshold, sides) =
            best_threshold_for(reader, attribute, instance_indices, growth.num_classes);
        let gain = split_gain(&sides);

        if stats::gr(gain, 0.0) {
            gain_found = true;
        }
        // Strictly greater wins; ties keep the earliest-found split.
        if gain > best_gain {
            best_gain = gain;
            best_attribute = attribute;
            best_threshold = threshold;
            best_sides = Some(sides);
        }
    }

    if !stats::gr(best_gain, 0.0) {
        return push_leaf(nodes, class_counts);
    }

    // Commit the split: partition and recurse into both sides.
    let mut left_indices = Vec::with_capacity(instance_indices.len());
    let mut right_indices = Vec::with_capacity(instance_indices.len());
    for &instance in instance_indices {
        if reader.value(instance, best_attribute) < best_threshold {
            left_indices.push(instance);
        } else {
            right_indices.push(instance);
        }
    }

    let [left_counts, right_counts] =
        best_sides.unwrap_or_else(|| unreachable!("positive gain implies a recorded split"));

    // Arena pattern: reserve the index, recurse, then overwrite.
    let node_index = nodes.len();
    nodes.push(Node::Leaf {
        distribution: None,
        normalized: None,
    });

    let left = build_node(
        reader,
        &left_indices,
        left_counts,
        window,
        rng,
        depth + 1,
        growth,
        nodes,
    );
    let right = build_node(
        reader,
        &right_indices,
        right_counts,
        window,
        rng,
        depth + 1,
        growth,
        nodes,
    );

    // When a successor is an empty leaf, keep this node's own counts so
    // inference has a fallback for instances routed into the gap.
    let empty_successor =
        nodes[left.index()].is_empty_leaf() || nodes[right.index()].is_empty_leaf();
    let (distribution, normalized) = if empty_successor {
        let mut normalized = class_counts.clone();
        stats::normalize(&mut normalized);
        (Some(class_counts), Some(normalized))
    } else {
        (None, None)
    };

    nodes[node_index] = Node::Split {
        attribute: best_attribute,
        threshold: best_threshold,
        left,
        right,
        distribution,
        normalized,
    };
    NodeIndex::new(node_index)
}

/// Best binary threshold for one attribute over one instance subset.
///
/// Walks the stably sorted instances, shifting each instance's weight from
/// the right row to the left row, and evaluates the information gain at
/// every point where the attribute value strictly increases. Returns the
/// best threshold (NaN when the attribute is constant over the subset) and
/// the 2×numClasses distribution of the winning split — or the undivided
/// distribution when no boundary exists.
fn best_threshold_for<R: FeatureReader>(
    reader: &R,
    attribute: usize,
    instance_indices: &[usize],
    num_classes: usize,
) -> (f64, [Vec<f64>; 2]) {
    let sorted = reader.sorted_indices(attribute, instance_indices);

    // All weight starts on the right side.
    let mut current = [vec![0.0f64; num_classes], vec![0.0f64; num_classes]];
    for &instance in &sorted {
        current[1][reader.class_value(instance)] += reader.weight(instance);
    }

    let prior = stats::entropy_over_columns(&current);
    let mut best = current.clone();
    let mut best_gain = f64::NEG_INFINITY;
    let mut threshold = f64::NAN;
    let mut previous_value = reader.value(sorted[0], attribute);

    for &instance in &sorted {
        let value = reader.value(instance, attribute);

        // A sensible boundary exists only where the value strictly increases.
        if value > previous_value {
            let gain = prior - stats::entropy_conditioned_on_rows(&current);
            if gain > best_gain {
                best_gain = gain;
                threshold = (value + previous_value) / 2.0;
                // Numeric rounding can collapse the midpoint onto the lower
                // value; fall back to the upper value so `< threshold`
                // still separates the two.
                if threshold <= previous_value {
                    threshold = value;
                }
                best[0].copy_from_slice(&current[0]);
                best[1].copy_from_slice(&current[1]);
            }
            previous_value = value;
        }

        let class_value = reader.class_value(instance);
        let weight = reader.weight(instance);
        current[0][class_value] += weight;
        current[1][class_value] -= weight;
    }

    (threshold, best)
}

/// Information gain of a recorded split distribution against its own merge.
fn split_gain(sides: &[Vec<f64>; 2]) -> f64 {
    stats::entropy_over_columns(sides) - stats::entropy_conditioned_on_rows(sides)
}
