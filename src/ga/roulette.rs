//! Weighted sampling with a binary search tree over cumulative weights.
//!
//! Each node stores the cumulative weight up to and including one entry.
//! A draw `x` uniform in `[0, total)` lands on the node with the smallest
//! cumulative value `>= x` (the interval that contains `x`). Nodes are
//! inserted median-first, so the tree is balanced and lookups are
//! O(log n).
//!
//! # References
//!
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and
//!   Machine Learning*, ch. 1 (roulette wheel selection)
//! - Wong & Easton (1980), "An Efficient Method for Weighted Sampling
//!   without Replacement"

use crate::error::GeneticError;
use rand::Rng;

/// A node of a [`BinaryRouletteTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct RouletteNode {
    index: usize,
    value: f64,
    less: Option<Box<RouletteNode>>,
    greater: Option<Box<RouletteNode>>,
}

impl RouletteNode {
    fn leaf(index: usize, value: f64) -> Self {
        Self {
            index,
            value,
            less: None,
            greater: None,
        }
    }

    /// Index of the entry this node stands for.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cumulative weight at the end of this node's interval.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Binary search tree keyed by cumulative weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinaryRouletteTree {
    root: Option<Box<RouletteNode>>,
    len: usize,
}

impl BinaryRouletteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a balanced tree from `(index, cumulative)` pairs sorted by
    /// cumulative value.
    pub fn from_sorted(nodes: &[(usize, f64)]) -> Self {
        let mut tree = Self::new();
        tree.insert_balanced(nodes);
        tree
    }

    fn insert_balanced(&mut self, nodes: &[(usize, f64)]) {
        if nodes.is_empty() {
            return;
        }
        let mid = nodes.len() / 2;
        let (index, value) = nodes[mid];
        self.insert(index, value);
        self.insert_balanced(&nodes[..mid]);
        self.insert_balanced(&nodes[mid + 1..]);
    }

    /// Inserts one node. Equal values go to the right of existing ones.
    pub fn insert(&mut self, index: usize, value: f64) {
        insert_into(&mut self.root, index, value);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The node whose interval contains `value`.
    ///
    /// Returns the node with the smallest cumulative value `>= value`; on
    /// ties, the first-inserted such node. A query above every node
    /// returns the node with the largest value. `None` only when empty.
    pub fn find(&self, value: f64) -> Option<&RouletteNode> {
        let mut current = self.root.as_deref();
        let mut ceiling = None;
        while let Some(node) = current {
            if value <= node.value {
                ceiling = Some(node);
                current = node.less.as_deref();
            } else {
                current = node.greater.as_deref();
            }
        }
        ceiling.or_else(|| self.last())
    }

    /// The node with the largest cumulative value.
    fn last(&self) -> Option<&RouletteNode> {
        let mut current = self.root.as_deref()?;
        while let Some(next) = current.greater.as_deref() {
            current = next;
        }
        Some(current)
    }
}

fn insert_into(slot: &mut Option<Box<RouletteNode>>, index: usize, value: f64) {
    match slot {
        None => *slot = Some(Box::new(RouletteNode::leaf(index, value))),
        Some(node) => {
            if value < node.value {
                insert_into(&mut node.less, index, value)
            } else {
                insert_into(&mut node.greater, index, value)
            }
        }
    }
}

/// Turns raw weights into `(index, cumulative)` pairs.
///
/// Entries with a zero, negative or non-finite weight can never be drawn
/// and are left out. Returns the pairs and the total weight.
pub(crate) fn cumulative_nodes(weights: impl IntoIterator<Item = f64>) -> (Vec<(usize, f64)>, f64) {
    let mut total = 0.0;
    let nodes = weights
        .into_iter()
        .enumerate()
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .map(|(i, w)| {
            total += w;
            (i, total)
        })
        .collect();
    (nodes, total)
}

/// Something with a probability of being drawn.
pub trait Probability {
    fn probability(&self) -> f64;
}

impl Probability for f64 {
    fn probability(&self) -> f64 {
        *self
    }
}

/// Tolerance on the probability sum accepted by [`RouletteSampler`].
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-4;

/// Draws indices from a discrete probability distribution.
///
/// Used for letter-frequency sampling where items carry normalized
/// probabilities.
#[derive(Debug, Clone, Default)]
pub struct RouletteSampler {
    tree: BinaryRouletteTree,
    total: f64,
}

impl RouletteSampler {
    /// Builds a sampler over `items`.
    pub fn new<T: Probability>(items: &[T]) -> Result<Self, GeneticError> {
        let mut sampler = Self::default();
        sampler.reindex(items)?;
        Ok(sampler)
    }

    /// Rebuilds the sampling tree and returns the probability sum.
    ///
    /// Fails on empty input or when probabilities do not sum to 1.
    pub fn reindex<T: Probability>(&mut self, items: &[T]) -> Result<f64, GeneticError> {
        if items.is_empty() {
            return Err(GeneticError::InvalidArgument(
                "cannot sample from an empty distribution".into(),
            ));
        }
        let (nodes, total) = cumulative_nodes(items.iter().map(Probability::probability));
        if (total - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(GeneticError::InvalidArgument(format!(
                "probabilities sum to {total}, expected 1"
            )));
        }
        self.tree = BinaryRouletteTree::from_sorted(&nodes);
        self.total = total;
        Ok(total)
    }

    /// Draws one index.
    pub fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let x = rng.random::<f64>() * self.total;
        self.tree.find(x).map(RouletteNode::index)
    }
}
