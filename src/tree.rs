//! Array backed expression trees.
//!
//! Nodes live in a complete binary tree of fixed capacity `2^height - 1`. The children of
//! slot `i` are `2i + 1` (left) and `2i + 2` (right). An empty slot below an existing node
//! is an operand that resolves to the node's recorded [`Leaf`] when evaluated.

use crate::color::Color;
use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::functions::{Accepts, Arity, Catalog, FunctionId, Operands, ParameterSet, Slot};
use crate::random;
use log::debug;
use rand::distributions::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

/// Trees taller than this would need more slots than is reasonable to allocate.
pub const MAX_HEIGHT: u32 = 20;

pub fn left(index: usize) -> usize {
    2 * index + 1
}

pub fn right(index: usize) -> usize {
    2 * index + 2
}

pub fn child(index: usize, slot: Slot) -> usize {
    match slot {
        Slot::Left => left(index),
        Slot::Right => right(index),
    }
}

pub fn parent(index: usize) -> Option<usize> {
    if index == 0 {
        None
    } else {
        Some((index - 1) / 2)
    }
}

/// What an operand resolves to when its slot holds no node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Leaf {
    /// `x` in the red channel for the left slot, `y` in the green channel for the right.
    Coordinate,
    Scalar(Color),
    Color(Color),
}

#[derive(Copy, Clone)]
enum LeafKind {
    Coordinate,
    Scalar,
    Color,
}

/// Uniform among the leaf kinds a function accepts, drawing any literal now. Functions that
/// accept no leaves get a coordinate, which they never read.
impl Distribution<Leaf> for Accepts {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Leaf {
        let kinds = [
            (self.variables, LeafKind::Coordinate),
            (self.scalars, LeafKind::Scalar),
            (self.colors, LeafKind::Color),
        ];
        let allowed: Vec<LeafKind> = kinds
            .iter()
            .filter(|(allowed, _)| *allowed)
            .map(|&(_, kind)| kind)
            .collect();
        match allowed.choose(rng) {
            Some(LeafKind::Scalar) => Leaf::Scalar(rng.sample(random::Scalar)),
            Some(LeafKind::Color) => Leaf::Color(rng.gen()),
            Some(LeafKind::Coordinate) | None => Leaf::Coordinate,
        }
    }
}

impl Leaf {
    pub fn accepted_by(self, accepts: Accepts) -> bool {
        match self {
            Leaf::Coordinate => accepts.variables,
            Leaf::Scalar(_) => accepts.scalars,
            Leaf::Color(_) => accepts.colors,
        }
    }

    pub fn resolve(self, slot: Slot, x: f64, y: f64) -> Color {
        match (self, slot) {
            (Leaf::Coordinate, Slot::Left) => Color::new(x, 0.0, 0.0),
            (Leaf::Coordinate, Slot::Right) => Color::new(0.0, y, 0.0),
            (Leaf::Scalar(value), _) | (Leaf::Color(value), _) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub function: FunctionId,
    pub parameters: ParameterSet,
    /// Indexed by [`Slot::index`].
    pub leaves: [Leaf; 2],
}

impl Node {
    pub fn new(function: FunctionId, parameters: ParameterSet, leaves: [Leaf; 2]) -> Self {
        Self {
            function,
            parameters,
            leaves,
        }
    }

    /// A node whose absent operands are both the pixel coordinate.
    pub fn with_coordinates(function: FunctionId, parameters: ParameterSet) -> Self {
        Self::new(function, parameters, [Leaf::Coordinate, Leaf::Coordinate])
    }

    pub fn random<R: Rng + ?Sized>(function: FunctionId, rng: &mut R) -> Self {
        let f = function.function();
        let parameters = f.generate_parameters(rng);
        let leaves = [rng.sample(f.accepts), rng.sample(f.accepts)];
        Self::new(function, parameters, leaves)
    }

    pub fn leaf(&self, slot: Slot) -> Leaf {
        self.leaves[slot.index()]
    }
}

/// Nodes detached from a tree, addressed the same way but rooted at slot 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subtree {
    nodes: Vec<Option<Node>>,
}

impl Subtree {
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first().and_then(Option::as_ref)
    }

    pub(crate) fn root_mut(&mut self) -> Option<&mut Node> {
        self.nodes.first_mut().and_then(Option::as_mut)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    height: u32,
    nodes: Vec<Option<Node>>,
}

impl Tree {
    /// `height` is clamped to `1..=MAX_HEIGHT`.
    pub fn empty(height: u32) -> Self {
        let height = height.clamp(1, MAX_HEIGHT);
        let capacity = (1usize << height) - 1;
        Self {
            height,
            nodes: vec![None; capacity],
        }
    }

    pub fn with_root(height: u32, root: Node) -> Self {
        let mut tree = Self::empty(height);
        tree.nodes[0] = Some(root);
        tree
    }

    pub fn generate<R: Rng + ?Sized>(catalog: &Catalog, config: &TreeConfig, rng: &mut R) -> Self {
        let mut tree = Self::empty(config.max_height);
        let created = tree.grow(0, catalog, config, rng);
        debug!(
            "generated tree of height {} with {} nodes",
            tree.height, created
        );
        tree
    }

    /// Builds a random subtree rooted at `index` breadth first, so sibling subtrees are
    /// generated independently. The slot at `index` is always filled (if in capacity),
    /// every later slot may terminate early as a leaf. Expects the slots below `index` to
    /// be empty. Returns the number of nodes created.
    pub fn grow<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        catalog: &Catalog,
        config: &TreeConfig,
        rng: &mut R,
    ) -> usize {
        let mut created = 0;
        let mut pending = VecDeque::new();
        pending.push_back(index);

        while let Some(i) = pending.pop_front() {
            if i >= self.capacity() {
                continue;
            }
            if i != index && rng.gen_bool(config.leaf_chance) {
                continue;
            }

            let function = catalog.select(rng);
            let f = function.function();
            if f.accepts.functions {
                match f.arity {
                    Arity::None => {}
                    Arity::Single => pending.push_back(left(i)),
                    Arity::Both => {
                        pending.push_back(left(i));
                        pending.push_back(right(i));
                    }
                    Arity::DontCare => {
                        if rng.gen_bool(config.dont_care_chance) {
                            pending.push_back(left(i));
                        }
                        if rng.gen_bool(config.dont_care_chance) {
                            pending.push_back(right(i));
                        }
                    }
                }
            }

            self.nodes[i] = Some(Node::random(function, rng));
            created += 1;
        }
        created
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index).and_then(Option::as_mut)
    }

    /// Returns false (and drops the node) if `index` is out of capacity.
    pub fn set_node(&mut self, index: usize, node: Node) -> bool {
        match self.nodes.get_mut(index) {
            Some(slot) => {
                *slot = Some(node);
                true
            }
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| i)
    }

    pub fn evaluate(&self, x: f64, y: f64) -> Color {
        self.evaluate_at(0, x, y)
    }

    fn evaluate_at(&self, index: usize, x: f64, y: f64) -> Color {
        let node = match self.node(index) {
            Some(node) => node,
            None => return Color::BLACK,
        };
        let function = node.function.function();

        let mut operands = [Color::BLACK; 2];
        for &slot in Slot::BOTH.iter() {
            let child = child(index, slot);
            let present = self.node(child).is_some();
            if function.arity.uses(slot) {
                operands[slot.index()] = if present {
                    self.evaluate_at(child, x, y)
                } else {
                    node.leaf(slot).resolve(slot, x, y)
                };
            } else if present {
                panic!(
                    "{}",
                    TreeError::ArityMismatch {
                        index,
                        function: function.name,
                        slot: slot.name(),
                    }
                );
            }
        }

        function.call(Operands::both(operands[0], operands[1]), &node.parameters)
    }

    /// One more than the deeper of the two child measures, where an absent node measures 1.
    /// Smaller near the bottom of the tree.
    pub fn subtree_size(&self, index: usize) -> usize {
        if self.node(index).is_none() {
            return 1;
        }
        1 + self
            .subtree_size(left(index))
            .max(self.subtree_size(right(index)))
    }

    /// Indices of every node reachable from `index`, breadth first.
    pub fn reachable(&self, index: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut pending = VecDeque::new();
        pending.push_back(index);
        while let Some(i) = pending.pop_front() {
            if self.node(i).is_none() {
                continue;
            }
            found.push(i);
            pending.push_back(left(i));
            pending.push_back(right(i));
        }
        found
    }

    /// Whether every node below `index` would fit in a tree with `capacity` slots.
    pub fn subtree_fits(&self, index: usize, capacity: usize) -> bool {
        self.reachable(index).into_iter().all(|i| i < capacity)
    }

    /// Releases every node reachable from `index`, returning how many were removed.
    pub fn delete_subtree(&mut self, index: usize) -> usize {
        let doomed = self.reachable(index);
        for &i in &doomed {
            self.nodes[i] = None;
        }
        doomed.len()
    }

    /// Takes every node reachable from `index` out of this tree.
    pub fn move_subtree(&mut self, index: usize) -> Subtree {
        let mut detached = Vec::new();
        let mut pending = VecDeque::new();
        pending.push_back((index, 0));
        while let Some((i, relative)) = pending.pop_front() {
            let node = match self.nodes.get_mut(i).and_then(Option::take) {
                Some(node) => node,
                None => continue,
            };
            place(&mut detached, relative, node);
            pending.push_back((left(i), left(relative)));
            pending.push_back((right(i), right(relative)));
        }
        Subtree { nodes: detached }
    }

    /// Deep copy of every node reachable from `index`, this tree is unchanged.
    pub fn copy_subtree(&self, index: usize) -> Subtree {
        let mut detached = Vec::new();
        let mut pending = VecDeque::new();
        pending.push_back((index, 0));
        while let Some((i, relative)) = pending.pop_front() {
            let node = match self.node(i) {
                Some(node) => node.clone(),
                None => continue,
            };
            place(&mut detached, relative, node);
            pending.push_back((left(i), left(relative)));
            pending.push_back((right(i), right(relative)));
        }
        Subtree { nodes: detached }
    }

    /// Attaches `subtree` at `index`, releasing whatever was there first. Nodes that would
    /// land beyond capacity are dropped, the count of those is returned.
    pub fn insert_subtree(&mut self, index: usize, mut subtree: Subtree) -> usize {
        self.delete_subtree(index);

        let mut dropped = 0;
        let mut pending = VecDeque::new();
        pending.push_back((index, 0));
        while let Some((i, relative)) = pending.pop_front() {
            let node = match subtree.nodes.get_mut(relative).and_then(Option::take) {
                Some(node) => node,
                None => continue,
            };
            if !self.set_node(i, node) {
                dropped += 1;
            }
            pending.push_back((left(i), left(relative)));
            pending.push_back((right(i), right(relative)));
        }

        if dropped > 0 {
            debug!("{} nodes did not fit below slot {}", dropped, index);
        }
        dropped
    }

    /// Checks the structural invariants every generated or mutated tree upholds.
    pub fn validate(&self) -> Result<(), TreeError> {
        for index in self.occupied() {
            let node = match self.node(index) {
                Some(node) => node,
                None => continue,
            };
            let function = node.function.function();

            if let Some(p) = parent(index) {
                if self.node(p).is_none() {
                    return Err(TreeError::OrphanNode { index });
                }
            }

            if node.parameters.len() != function.parameter_count() {
                return Err(TreeError::ParameterMismatch {
                    index,
                    function: function.name,
                    expected: function.parameter_count(),
                    found: node.parameters.len(),
                });
            }

            for &slot in Slot::BOTH.iter() {
                let uses = function.arity.uses(slot);
                if self.node(child(index, slot)).is_some() && !(uses && function.accepts.functions)
                {
                    return Err(TreeError::ArityMismatch {
                        index,
                        function: function.name,
                        slot: slot.name(),
                    });
                }
                if uses && !node.leaf(slot).accepted_by(function.accepts) {
                    return Err(TreeError::InvalidLeaf {
                        index,
                        function: function.name,
                        slot: slot.name(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn place(nodes: &mut Vec<Option<Node>>, index: usize, node: Node) {
    if nodes.len() <= index {
        nodes.resize(index + 1, None);
    }
    nodes[index] = Some(node);
}
