//! Procedural images from evolved expression trees.
//!
//! A [`Tree`] maps a pixel coordinate in `[0, 1] x [0, 1]` to a color. Trees are grown at
//! random from a catalog of functions, mutated, crossed with each other and scored by how
//! much local variation their rendered images show.
//!
//! Rendered images are RGB, row-major, top row first. Pixel `(i, j)` of a `width x height`
//! image samples the tree at `(i / width, j / height)`.

pub mod color;
pub mod config;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod functions;
pub mod noise;
pub mod program;
pub mod random;
pub mod render;
pub mod tree;

pub use color::Color;
pub use config::Config;
pub use evolution::{Evolver, MutationReport};
pub use program::Program;
pub use render::{RenderSession, Rescale};
pub use tree::Tree;

use config::TreeConfig;
use functions::Catalog;
use image::RgbImage;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// A random tree built from every function with the default shape settings. The same seed
/// always gives the same tree.
pub fn new_random_tree(seed: Option<u64>, max_height: u32) -> Tree {
    let mut rng = match seed {
        Some(seed) => Pcg32::seed_from_u64(seed),
        None => Pcg32::from_entropy(),
    };
    let config = TreeConfig {
        max_height,
        ..TreeConfig::default()
    };
    Tree::generate(&Catalog::default(), &config, &mut rng)
}

pub fn render(tree: &Tree, width: u32, height: u32) -> RgbImage {
    render::render(tree, width, height)
}

pub fn mutate<R: Rng + ?Sized>(tree: &mut Tree, rng: &mut R) -> MutationReport {
    Evolver::default().mutate(tree, rng)
}

pub fn crossover<R: Rng + ?Sized>(a: &mut Tree, b: &mut Tree, rng: &mut R) -> Option<usize> {
    Evolver::default().crossover(a, b, rng)
}

pub fn evaluate_fitness(image: &RgbImage) -> f64 {
    fitness::evaluate(image)
}
