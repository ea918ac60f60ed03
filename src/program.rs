use crate::config::Config;
use crate::error::{ConfigError, RenderError};
use crate::evolution::{Evolver, MutationReport};
use crate::fitness;
use crate::render::{RenderSession, Rescale};
use crate::tree::Tree;
use image::RgbImage;
use log::info;
use rand::SeedableRng;
use rand_pcg::Pcg32;

/// An interactive session: one current tree, an optional saved tree to revert to or cross
/// with, and the pixels of the last render.
#[derive(Debug)]
pub struct Program {
    evolver: Evolver,
    session: RenderSession,
    rng: Pcg32,
    width: u32,
    height: u32,
    tree: Tree,
    saved: Option<Tree>,
    pixels: RgbImage,
}

impl Program {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let evolver = Evolver::from_config(config)?;
        let mut rng = match config.evolution.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        let tree = evolver.random_tree(&mut rng);
        let (width, height) = (config.render.width, config.render.height);
        Ok(Self {
            evolver,
            session: RenderSession::new(&config.render),
            rng,
            width,
            height,
            tree,
            saved: None,
            pixels: RgbImage::new(width, height),
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn saved(&self) -> Option<&Tree> {
        self.saved.as_ref()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    /// Replaces the current tree with a fresh random one.
    pub fn regenerate(&mut self) {
        self.tree = self.evolver.random_tree(&mut self.rng);
        info!("regenerated tree with {} nodes", self.tree.node_count());
    }

    /// Clears any earlier cancellation, then renders the current tree.
    pub fn render(&mut self) -> Result<&RgbImage, RenderError> {
        self.session.reset();
        self.pixels = self.session.render(&self.tree, self.width, self.height)?;
        Ok(&self.pixels)
    }

    pub fn mutate(&mut self) -> MutationReport {
        self.evolver.mutate(&mut self.tree, &mut self.rng)
    }

    /// Crosses the current tree with the saved one, both change. `None` without a saved tree
    /// or a shared crossover slot.
    pub fn crossover(&mut self) -> Option<usize> {
        let saved = self.saved.as_mut()?;
        self.evolver.crossover(&mut self.tree, saved, &mut self.rng)
    }

    pub fn save(&mut self) {
        self.saved = Some(self.tree.clone());
    }

    /// Restores the saved tree, returning false if nothing was saved.
    pub fn revert(&mut self) -> bool {
        match &self.saved {
            Some(saved) => {
                self.tree = saved.clone();
                true
            }
            None => false,
        }
    }

    pub fn set_rescale(&mut self, rescale: Rescale) {
        self.session.set_rescale(rescale);
    }

    /// Fitness of the last render.
    pub fn fitness(&self) -> f64 {
        fitness::evaluate(&self.pixels)
    }

    pub fn progress(&self) -> f32 {
        self.session.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(seed: u64) -> Program {
        let mut config = Config::default();
        config.evolution.seed = Some(seed);
        config.tree.max_height = 5;
        config.render.width = 24;
        config.render.height = 16;
        config.render.region_size = 8;
        Program::new(&config).unwrap()
    }

    #[test]
    fn seeded_programs_agree() {
        let mut a = program(21);
        let mut b = program(21);
        assert_eq!(a.tree(), b.tree());
        a.mutate();
        b.mutate();
        assert_eq!(a.tree(), b.tree());
        assert_eq!(a.render().unwrap().as_raw(), b.render().unwrap().as_raw());
    }

    #[test]
    fn save_and_revert() {
        let mut program = program(4);
        assert!(!program.revert());
        assert_eq!(program.crossover(), None);

        program.save();
        let saved = program.tree().clone();
        for _ in 0..20 {
            program.regenerate();
        }
        assert!(program.revert());
        assert_eq!(program.tree(), &saved);
        assert_eq!(program.saved(), Some(&saved));
    }

    #[test]
    fn render_then_score() {
        let mut program = program(8);
        program.set_rescale(Rescale::MinMax);
        let (width, height) = program.render().unwrap().dimensions();
        assert_eq!((width, height), (24, 16));
        assert_eq!(program.progress(), 1.0);
        assert!(program.fitness().is_finite());
    }

    #[test]
    fn render_clears_earlier_cancel() {
        let mut program = program(13);
        program.session().cancel();
        assert!(program.render().is_ok());
        assert!(!program.session().is_cancelled());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.render.workers = 0;
        assert!(Program::new(&config).is_err());
    }
}
