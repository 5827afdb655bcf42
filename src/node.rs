use std::fmt;

/// Index into a `Vec<Node>` arena, identifying a specific node in a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`] rather than pointers — cache-friendly and trivially
/// serializable.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// A terminal node.
    ///
    /// A leaf grown from an empty instance subset stores no distributions;
    /// inference bubbles up to the nearest ancestor that kept one.
    Leaf {
        /// Raw per-class weight sums, absent for an empty leaf.
        distribution: Option<Vec<f64>>,
        /// `distribution` normalized to a probability vector.
        normalized: Option<Vec<f64>>,
    },
    /// An interior split node.
    Split {
        /// Attribute used for the split.
        attribute: usize,
        /// Threshold: instances with `value < threshold` go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Raw per-class weight sums, kept only when some successor carries
        /// no distribution of its own.
        distribution: Option<Vec<f64>>,
        /// `distribution` normalized, used as the inference fallback.
        normalized: Option<Vec<f64>>,
    },
}

impl Node {
    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Return `true` for a leaf grown from an empty instance subset.
    pub(crate) fn is_empty_leaf(&self) -> bool {
        matches!(
            self,
            Node::Leaf {
                distribution: None,
                ..
            }
        )
    }
}
