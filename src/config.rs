use crate::error::{CatalogError, ConfigError};
use crate::functions::Catalog;
use crate::render::Rescale;
use crate::tree::MAX_HEIGHT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every tunable of tree generation, mutation, rendering and the evolution driver. Missing
/// keys take their defaults, so an empty file is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tree: TreeConfig,
    pub mutation: MutationConfig,
    pub render: RenderConfig,
    pub evolution: EvolutionConfig,
    /// Function names random generation must never choose.
    pub disabled_functions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_height: u32,
    /// Chance that a non-root slot terminates as a leaf.
    pub leaf_chance: f64,
    /// Chance that each operand of a don't-care function becomes a subtree.
    pub dont_care_chance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Divided by a node's subtree size to get its chance of mutating.
    pub node_rate: f64,
    /// Chance that a mutating node regrows its whole subtree rather than swapping function.
    pub regenerate_chance: f64,
    /// Chance, per node, of nudging its literals.
    pub perturb_chance: f64,
    pub perturb_range: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub workers: usize,
    /// Side length of the square regions handed to workers.
    pub region_size: u32,
    pub rescale: Rescale,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub seed: Option<u64>,
    pub population: usize,
    pub generations: usize,
    pub survivors: usize,
    /// Candidates are scored at this (square) resolution, the winner is saved at full size.
    pub train_resolution: u32,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            mutation: MutationConfig::default(),
            render: RenderConfig::default(),
            evolution: EvolutionConfig::default(),
            disabled_functions: Vec::new(),
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_height: 7,
            leaf_chance: 0.05,
            dont_care_chance: 0.8,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            node_rate: 0.5,
            regenerate_chance: 0.5,
            perturb_chance: 0.25,
            perturb_range: 0.4,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            workers: 4,
            region_size: 64,
            rescale: Rescale::Clamp,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            population: 24,
            generations: 20,
            survivors: 6,
            train_resolution: 128,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_HEIGHT).contains(&self.tree.max_height) {
            return Err(invalid(format!(
                "tree.max_height must be between 1 and {}",
                MAX_HEIGHT
            )));
        }
        probability("tree.leaf_chance", self.tree.leaf_chance)?;
        probability("tree.dont_care_chance", self.tree.dont_care_chance)?;
        probability("mutation.regenerate_chance", self.mutation.regenerate_chance)?;
        probability("mutation.perturb_chance", self.mutation.perturb_chance)?;
        if !(self.mutation.node_rate >= 0.0 && self.mutation.node_rate.is_finite()) {
            return Err(invalid("mutation.node_rate must be a non-negative number"));
        }
        if !(self.mutation.perturb_range >= 0.0 && self.mutation.perturb_range.is_finite()) {
            return Err(invalid("mutation.perturb_range must be a non-negative number"));
        }
        if self.render.width == 0 || self.render.height == 0 {
            return Err(invalid("render size must be non-zero"));
        }
        if self.render.workers == 0 {
            return Err(invalid("render.workers must be at least 1"));
        }
        if self.render.region_size == 0 {
            return Err(invalid("render.region_size must be at least 1"));
        }
        if self.evolution.population < 2 {
            return Err(invalid("evolution.population must be at least 2"));
        }
        if self.evolution.survivors == 0 || self.evolution.survivors > self.evolution.population {
            return Err(invalid(
                "evolution.survivors must be between 1 and the population",
            ));
        }
        if self.evolution.train_resolution == 0 {
            return Err(invalid("evolution.train_resolution must be non-zero"));
        }
        self.catalog()?;
        Ok(())
    }

    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        Catalog::with_disabled(self.disabled_functions.as_slice())
    }
}

fn invalid<S: Into<String>>(message: S) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_yaml("{}").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let yaml = "tree:\n  max_height: 4\n\
                    render:\n  rescale: min_max\n\
                    disabled_functions: [noise, color_noise]\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.tree.max_height, 4);
        assert_eq!(config.tree.leaf_chance, 0.05);
        assert_eq!(config.render.rescale, Rescale::MinMax);
        assert_eq!(config.render.width, 512);
        assert_eq!(config.catalog().unwrap().enabled().len(), 15);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            Config::from_yaml("tree:\n  leaf_chance: 1.5\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("tree:\n  max_height: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("render:\n  workers: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("disabled_functions: [sparkle]\n"),
            Err(ConfigError::Catalog(CatalogError::UnknownFunction(_)))
        ));
        assert!(matches!(
            Config::from_yaml("tree:\n  max_height: tall\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "evolution:\n  seed: 9\n  population: 4\n  survivors: 2").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.evolution.seed, Some(9));
        assert_eq!(config.evolution.population, 4);

        let again = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("absent.yml")),
            Err(ConfigError::Io(_))
        ));
    }
}
