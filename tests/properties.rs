use genetic_art::config::{RenderConfig, TreeConfig};
use genetic_art::functions::{Catalog, FunctionId, ParameterSet};
use genetic_art::render::{self, Rescale};
use genetic_art::tree::{Leaf, Node};
use genetic_art::{Color, Evolver, RenderSession, Tree};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

const SEEDS: u64 = 40;

fn random_tree(seed: u64, height: u32) -> Tree {
    genetic_art::new_random_tree(Some(seed), height)
}

fn grid() -> impl Iterator<Item = (f64, f64)> {
    (0..=12).flat_map(|i| (0..=12).map(move |j| (i as f64 / 12.0, j as f64 / 12.0)))
}

#[test]
fn evaluation_is_finite_and_folded() {
    for seed in 0..SEEDS {
        let tree = random_tree(seed, 1 + (seed % 8) as u32);
        for (x, y) in grid() {
            let color = tree.evaluate(x, y);
            for &c in color.channels().iter() {
                assert!(
                    c.is_finite() && (0.0..=1.0).contains(&c),
                    "seed {}: {:?}",
                    seed,
                    color
                );
            }
        }
    }
}

#[test]
fn same_seed_same_tree() {
    assert_eq!(random_tree(77, 7), random_tree(77, 7));
}

#[test]
fn subtree_size_is_monotone() {
    let mut rng = Pcg32::seed_from_u64(1);
    for seed in 0..SEEDS {
        let mut tree = random_tree(seed, 6);
        let occupied: Vec<usize> = tree.occupied().filter(|&i| i > 0).collect();
        if occupied.is_empty() {
            continue;
        }
        let index = occupied[rng.gen_range(0..occupied.len())];

        let before = tree.subtree_size(0);
        let moved = tree.move_subtree(index);
        let shrunk = tree.subtree_size(0);
        assert!(shrunk <= before);

        tree.insert_subtree(index, moved);
        assert!(tree.subtree_size(0) >= shrunk);
        assert_eq!(tree.subtree_size(0), before);
    }
}

#[test]
fn move_then_insert_round_trips() {
    for seed in 0..SEEDS {
        let mut tree = random_tree(seed, 7);
        let original = tree.clone();
        for index in original.occupied() {
            let moved = tree.move_subtree(index);
            assert_eq!(tree.insert_subtree(index, moved), 0);
        }
        assert_eq!(tree, original);
        for (x, y) in grid() {
            assert_eq!(tree.evaluate(x, y), original.evaluate(x, y));
        }
    }
}

#[test]
fn crossover_preserves_node_count() {
    let evolver = Evolver::default();
    let mut rng = Pcg32::seed_from_u64(99);
    for seed in 0..SEEDS {
        let mut a = random_tree(seed, 5 + (seed % 3) as u32);
        let mut b = random_tree(seed + 1000, 7 - (seed % 3) as u32);
        let total = a.node_count() + b.node_count();
        evolver.crossover(&mut a, &mut b, &mut rng);
        assert_eq!(a.node_count() + b.node_count(), total);
        assert!(a.validate().is_ok() && b.validate().is_ok());
    }
}

#[test]
fn repeated_mutation_keeps_invariants() {
    let mut rng = Pcg32::seed_from_u64(5);
    for seed in 0..10 {
        let mut tree = random_tree(seed, 6);
        for _ in 0..50 {
            genetic_art::mutate(&mut tree, &mut rng);
            if let Err(e) = tree.validate() {
                panic!("seed {}: {}", seed, e);
            }
        }
        for (x, y) in grid() {
            assert!(tree.evaluate(x, y).is_finite());
        }
    }
}

#[test]
fn restricted_catalog_is_respected() {
    let catalog = Catalog::with_disabled(&["noise", "color_noise", "divide"]).unwrap();
    let evolver = Evolver {
        catalog,
        tree: TreeConfig::default(),
        ..Evolver::default()
    };
    let mut rng = Pcg32::seed_from_u64(17);
    for _ in 0..10 {
        let mut tree = evolver.random_tree(&mut rng);
        evolver.mutate(&mut tree, &mut rng);
        for index in tree.occupied().collect::<Vec<_>>() {
            let function = tree.node(index).map(|n| n.function);
            assert!(!matches!(
                function,
                Some(FunctionId::Noise) | Some(FunctionId::ColorNoise) | Some(FunctionId::Divide)
            ));
        }
    }
}

fn checkerboard_with_noise(size: u32) -> RgbImage {
    let mut image = RgbImage::new(size, size);
    for y in (0..size).step_by(2) {
        for x in (0..size).step_by(2) {
            if (x / 2 + y / 2) % 2 == 0 {
                let square = Rect::at(x as i32, y as i32).of_size(2, 2);
                draw_filled_rect_mut(&mut image, square, Rgb([230, 230, 230]));
            }
        }
    }
    let mut rng = Pcg32::seed_from_u64(3);
    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let jitter: i16 = rng.gen_range(-20..=20);
            *channel = (*channel as i16 + jitter).max(0).min(255) as u8;
        }
    }
    image
}

#[test]
fn fitness_rewards_variation() {
    let black = RgbImage::new(32, 32);
    let white = RgbImage::from_pixel(32, 32, Rgb([255, 255, 255]));
    let checker = checkerboard_with_noise(32);

    let checker_score = genetic_art::evaluate_fitness(&checker);
    assert!(genetic_art::evaluate_fitness(&black) < checker_score);
    assert!(genetic_art::evaluate_fitness(&white) < checker_score);
}

#[test]
fn add_of_coordinates_at_height_one() {
    let root = Node::with_coordinates(FunctionId::Add, ParameterSet::default());
    let tree = Tree::with_root(1, root);
    assert_eq!(tree.evaluate(0.25, 0.75), Color::new(0.25, 0.75, 0.0));
}

#[test]
fn identity_on_x_renders_distinct_columns() {
    let root = Node::new(
        FunctionId::Abs,
        ParameterSet::default(),
        [Leaf::Coordinate, Leaf::Coordinate],
    );
    let tree = Tree::with_root(1, root);
    let image = genetic_art::render(&tree, 2, 2);

    assert_ne!(image.get_pixel(0, 0), image.get_pixel(1, 0));
    assert_eq!(image.get_pixel(0, 0), image.get_pixel(0, 1));
    assert_eq!(image.get_pixel(1, 0), image.get_pixel(1, 1));
}

#[test]
fn parallel_render_matches_sequential() {
    for seed in 0..8 {
        let tree = random_tree(seed, 6);
        for &rescale in &[Rescale::Clamp, Rescale::MinMax] {
            let session = RenderSession::new(&RenderConfig {
                width: 33,
                height: 20,
                workers: 3,
                region_size: 7,
                rescale,
            });
            let parallel = session.render(&tree, 33, 20).unwrap();
            let sequential = render::render_with(&tree, 33, 20, rescale);
            assert_eq!(parallel.as_raw(), sequential.as_raw(), "seed {}", seed);
            assert_eq!(session.progress(), 1.0);
        }
    }
}
