//! Random construction, mutation and crossover of trees.

use crate::config::{Config, MutationConfig, TreeConfig};
use crate::error::ConfigError;
use crate::functions::{Arity, Catalog, Slot};
use crate::random;
use crate::tree::{child, Leaf, Subtree, Tree};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

/// What a call to [`Evolver::mutate`] changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Subtrees thrown away and grown again.
    pub regenerated: usize,
    /// Nodes rebound to a different function.
    pub swapped: usize,
    /// Nodes whose literals were nudged.
    pub perturbed: usize,
}

impl MutationReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evolver {
    pub catalog: Catalog,
    pub tree: TreeConfig,
    pub mutation: MutationConfig,
}

impl Evolver {
    pub fn new(catalog: Catalog, tree: TreeConfig, mutation: MutationConfig) -> Self {
        Self {
            catalog,
            tree,
            mutation,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.catalog()?,
            config.tree.clone(),
            config.mutation.clone(),
        ))
    }

    pub fn random_tree<R: Rng + ?Sized>(&self, rng: &mut R) -> Tree {
        Tree::generate(&self.catalog, &self.tree, rng)
    }

    /// Visits every node once. Nodes near the leaves are the likeliest to change, since the
    /// chance is divided by the subtree size.
    pub fn mutate<R: Rng + ?Sized>(&self, tree: &mut Tree, rng: &mut R) -> MutationReport {
        let mut report = MutationReport::default();
        let indices: Vec<usize> = tree.occupied().collect();

        for index in indices {
            // an earlier regeneration or swap may have released this slot
            if tree.node(index).is_none() {
                continue;
            }

            let chance = (self.mutation.node_rate / tree.subtree_size(index) as f64).min(1.0);
            if rng.gen_bool(chance) {
                if rng.gen_bool(self.mutation.regenerate_chance) {
                    tree.delete_subtree(index);
                    tree.grow(index, &self.catalog, &self.tree, rng);
                    report.regenerated += 1;
                } else {
                    self.swap_function(tree, index, rng);
                    report.swapped += 1;
                }
            }

            if rng.gen_bool(self.mutation.perturb_chance) && self.perturb(tree, index, rng) {
                report.perturbed += 1;
            }
        }

        if !report.is_empty() {
            debug!("mutated tree: {:?}", report);
        }
        report
    }

    /// Rebinds the node at `index` to a random enabled function, adjusting its literals,
    /// leaves and children to what the new function needs.
    fn swap_function<R: Rng + ?Sized>(&self, tree: &mut Tree, index: usize, rng: &mut R) {
        let old = match tree.node(index) {
            Some(node) => node.function.function(),
            None => return,
        };
        let id = self.catalog.select(rng);
        let new = id.function();

        for &slot in Slot::BOTH.iter() {
            if !(new.arity.uses(slot) && new.accepts.functions) {
                tree.delete_subtree(child(index, slot));
            }
        }

        if let Some(node) = tree.node_mut(index) {
            if (old.scalars, old.colors) != (new.scalars, new.colors) {
                node.parameters = new.generate_parameters(rng);
            }
            for leaf in node.leaves.iter_mut() {
                if !leaf.accepted_by(new.accepts) {
                    *leaf = rng.sample(new.accepts);
                }
            }
            node.function = id;
        }

        for &slot in Slot::BOTH.iter() {
            let required = new.arity.uses(slot) && new.accepts.functions;
            let was_required = old.arity.uses(slot) && old.accepts.functions;
            let target = child(index, slot);
            if !required || was_required || tree.node(target).is_some() {
                continue;
            }
            // same shape rule as construction
            if new.arity == Arity::DontCare && !rng.gen_bool(self.tree.dont_care_chance) {
                continue;
            }
            tree.grow(target, &self.catalog, &self.tree, rng);
        }
    }

    /// Nudges the literals of an input node and any literal leaves. Returns whether there was
    /// anything to nudge.
    fn perturb<R: Rng + ?Sized>(&self, tree: &mut Tree, index: usize, rng: &mut R) -> bool {
        let range = self.mutation.perturb_range;
        let node = match tree.node_mut(index) {
            Some(node) => node,
            None => return false,
        };
        let mut changed = false;

        if node.function.is_input() {
            let function = node.function.function();
            for (i, value) in node.parameters.values_mut().iter_mut().enumerate() {
                *value = if function.is_color_parameter(i) {
                    random::perturb_color(rng, *value, range)
                } else {
                    random::perturb_scalar(rng, *value, range)
                };
                changed = true;
            }
        }

        for leaf in node.leaves.iter_mut() {
            match leaf {
                Leaf::Scalar(value) => {
                    *value = random::perturb_scalar(rng, *value, range);
                    changed = true;
                }
                Leaf::Color(value) => {
                    *value = random::perturb_color(rng, *value, range);
                    changed = true;
                }
                Leaf::Coordinate => {}
            }
        }
        changed
    }

    /// Swaps the subtrees below a random non-root slot occupied in both trees. Only slots
    /// whose subtrees fit the other tree are candidates, so no node is ever dropped and the
    /// total node count is unchanged. Returns the slot, or `None` if there was no candidate.
    pub fn crossover<R: Rng + ?Sized>(
        &self,
        a: &mut Tree,
        b: &mut Tree,
        rng: &mut R,
    ) -> Option<usize> {
        let candidates: Vec<usize> = a
            .occupied()
            .filter(|&i| {
                i != 0
                    && b.node(i).is_some()
                    && a.subtree_fits(i, b.capacity())
                    && b.subtree_fits(i, a.capacity())
            })
            .collect();
        let index = match candidates.choose(rng) {
            Some(&index) => index,
            None => {
                debug!("no crossover point shared by both trees");
                return None;
            }
        };

        let mut from_a = a.move_subtree(index);
        let mut from_b = b.move_subtree(index);
        blend_roots(&mut from_a, &mut from_b, rng);
        a.insert_subtree(index, from_b);
        b.insert_subtree(index, from_a);

        debug!("crossed over at slot {}", index);
        Some(index)
    }
}

// When both exchanged roots run the same function, each child's literals are drawn between
// the two parents' literals.
fn blend_roots<R: Rng + ?Sized>(a: &mut Subtree, b: &mut Subtree, rng: &mut R) {
    let (a, b) = match (a.root_mut(), b.root_mut()) {
        (Some(a), Some(b)) if a.function == b.function => (a, b),
        _ => return,
    };
    let function = a.function.function();
    let pairs = a
        .parameters
        .values_mut()
        .iter_mut()
        .zip(b.parameters.values_mut().iter_mut());
    for (i, (x, y)) in pairs.enumerate() {
        let (left, right) = (*x, *y);
        if function.is_color_parameter(i) {
            *x = random::blend_color(rng, left, right);
            *y = random::blend_color(rng, left, right);
        } else {
            *x = random::blend_scalar(rng, left, right);
            *y = random::blend_scalar(rng, left, right);
        }
    }
}
