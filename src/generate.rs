use genetic_art::config::{Config, RenderConfig};
use genetic_art::fitness;
use genetic_art::{Evolver, RenderSession, Tree};
use log::{error, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::cmp::Ordering;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_CONFIG: &str = "genetic_art.yml";

struct ScoredTree {
    tree: Tree,
    score: Option<f64>,
}

impl ScoredTree {
    fn new(tree: Tree) -> Self {
        Self { tree, score: None }
    }

    fn score(&self) -> f64 {
        self.score.unwrap_or(f64::NEG_INFINITY)
    }
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_owned());
    let config = if Path::new(&path).exists() {
        info!("loading config from {}", path);
        Config::load(&path)?
    } else {
        info!("{} not found, using defaults", path);
        Config::default()
    };
    config.validate()?;

    let evolver = Evolver::from_config(&config)?;
    let mut rng = match config.evolution.seed {
        Some(seed) => Pcg32::seed_from_u64(seed),
        None => Pcg32::from_entropy(),
    };

    let resolution = config.evolution.train_resolution;
    let train = RenderSession::new(&RenderConfig {
        width: resolution,
        height: resolution,
        ..config.render.clone()
    });
    let population_size = config.evolution.population;
    let survivors = config.evolution.survivors;

    let mut population: Vec<ScoredTree> = (0..population_size)
        .map(|_| ScoredTree::new(evolver.random_tree(&mut rng)))
        .collect();

    for generation in 0..=config.evolution.generations {
        for candidate in population.iter_mut().filter(|c| c.score.is_none()) {
            let image = train.render(&candidate.tree, resolution, resolution)?;
            candidate.score = Some(fitness::evaluate(&image));
        }

        population.sort_unstable_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
        });

        let average_score =
            population.iter().map(ScoredTree::score).sum::<f64>() / population.len() as f64;
        let average_nodes = population
            .iter()
            .map(|c| c.tree.node_count() as f64)
            .sum::<f64>()
            / population.len() as f64;
        info!(
            "{}, {:.3}, {:.3}, {:.1}",
            generation,
            average_score,
            population[0].score(),
            average_nodes
        );

        // the last pass only scores the final children
        if generation == config.evolution.generations {
            break;
        }

        population.truncate(survivors);
        while population.len() < population_size {
            if survivors > 1 && rng.gen_bool(0.5) {
                let a = rng.gen_range(0..survivors);
                let b = rng.gen_range(0..survivors);
                let mut child_a = population[a].tree.clone();
                let mut child_b = population[b].tree.clone();
                evolver.crossover(&mut child_a, &mut child_b, &mut rng);
                population.push(ScoredTree::new(child_a));
                if population.len() < population_size {
                    population.push(ScoredTree::new(child_b));
                }
            } else {
                let parent = &population[rng.gen_range(0..survivors)];
                let mut child = parent.tree.clone();
                evolver.mutate(&mut child, &mut rng);
                population.push(ScoredTree::new(child));
            }
        }
    }

    let best = &population[0];
    let full = RenderSession::new(&config.render);
    let image = full.render(&best.tree, config.render.width, config.render.height)?;

    fs::create_dir_all(&config.evolution.output_dir)?;
    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let path = config
        .evolution
        .output_dir
        .join(format!("{}-{:.2}.png", millis, best.score()));
    image.save(&path)?;
    info!("saved {}", path.display());
    Ok(())
}
