//! Turning a tree into pixels, either directly or split into regions across worker threads.

use crate::color::Color;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::tree::Tree;
use crossbeam::queue::SegQueue;
use crossbeam::sync::WaitGroup;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// How evaluated channels become bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rescale {
    /// Clamp to `[0, 1]` and scale.
    Clamp,
    /// Stretch the image's own channel range onto `[0, 255]`.
    MinMax,
}

/// Smallest and largest channel value seen.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
}

impl Extrema {
    pub const EMPTY: Extrema = Extrema {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    pub fn include(&mut self, color: Color) {
        for &c in color.channels().iter() {
            self.min = self.min.min(c);
            self.max = self.max.max(c);
        }
    }

    pub fn merge(&mut self, other: Extrema) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

pub fn quantize(value: f64, rescale: Rescale, extrema: Extrema) -> u8 {
    let value = match rescale {
        Rescale::MinMax if extrema.max > extrema.min => {
            (value - extrema.min) / (extrema.max - extrema.min)
        }
        _ => value,
    };
    (value.max(0.0).min(1.0) * 255.0).round() as u8
}

fn quantize_color(color: Color, rescale: Rescale, extrema: Extrema) -> [u8; 3] {
    [
        quantize(color.r, rescale, extrema),
        quantize(color.g, rescale, extrema),
        quantize(color.b, rescale, extrema),
    ]
}

/// Normalized coordinate of pixel `i` along an axis of `length` pixels.
pub fn coordinate(i: u32, length: u32) -> f64 {
    i as f64 / length as f64
}

/// Renders on the calling thread with clamped quantization.
pub fn render(tree: &Tree, width: u32, height: u32) -> RgbImage {
    render_with(tree, width, height, Rescale::Clamp)
}

pub fn render_with(tree: &Tree, width: u32, height: u32, rescale: Rescale) -> RgbImage {
    let colors: Vec<Color> = (0..height)
        .flat_map(|j| {
            (0..width).map(move |i| tree.evaluate(coordinate(i, width), coordinate(j, height)))
        })
        .collect();

    let mut extrema = Extrema::EMPTY;
    for &color in &colors {
        extrema.include(color);
    }

    let mut image = RgbImage::new(width, height);
    for (pixel, color) in image.pixels_mut().zip(colors) {
        *pixel = Rgb(quantize_color(color, rescale, extrema));
    }
    image
}

/// A rectangle of pixels handed to one worker at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Row-major pixel positions inside the region.
    pub fn pixels(self) -> impl Iterator<Item = (u32, u32)> {
        (self.y..self.y + self.height)
            .flat_map(move |j| (self.x..self.x + self.width).map(move |i| (i, j)))
    }
}

/// Tiles the image with squares of side `size`, trimmed at the right and bottom edges.
pub fn partition(width: u32, height: u32, size: u32) -> Vec<Region> {
    let size = size.max(1);
    let mut regions = Vec::new();
    for y in (0..height).step_by(size as usize) {
        for x in (0..width).step_by(size as usize) {
            regions.push(Region {
                x,
                y,
                width: size.min(width - x),
                height: size.min(height - y),
            });
        }
    }
    regions
}

type Quantized = Vec<(Region, Vec<[u8; 3]>)>;

/// Parallel renderer. Workers claim regions from a shared queue and evaluate them, agree on
/// the image-wide extrema, then quantize their own regions.
///
/// The cancellation flag stays set until [`RenderSession::reset`], so it can be raised from
/// another thread while a render is running.
#[derive(Debug)]
pub struct RenderSession {
    workers: usize,
    region_size: u32,
    rescale: Rescale,
    cancelled: AtomicBool,
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl RenderSession {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            region_size: config.region_size.max(1),
            rescale: config.rescale,
            cancelled: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    pub fn set_rescale(&mut self, rescale: Rescale) {
        self.rescale = rescale;
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fraction of the current (or last) render's work done. Every region counts twice,
    /// once evaluated and once quantized. Advisory only.
    pub fn progress(&self) -> f32 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        (self.completed.load(Ordering::Relaxed) as f32 / total as f32).min(1.0)
    }

    pub fn render(&self, tree: &Tree, width: u32, height: u32) -> Result<RgbImage, RenderError> {
        let regions = partition(width, height, self.region_size);
        let total = (regions.len() * 2).max(1);
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);

        let mut image = RgbImage::new(width, height);
        if regions.is_empty() {
            self.completed.store(total, Ordering::Relaxed);
            return Ok(image);
        }

        let workers = self.workers.min(regions.len());
        debug!(
            "rendering {}x{} as {} regions on {} workers",
            width,
            height,
            regions.len(),
            workers
        );

        let queue = SegQueue::new();
        for region in regions {
            queue.push(region);
        }
        let extrema = Mutex::new(Extrema::EMPTY);
        let barrier = WaitGroup::new();

        let finished = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let barrier = barrier.clone();
                    let queue = &queue;
                    let extrema = &extrema;
                    s.spawn(move |_| self.work(tree, width, height, queue, extrema, barrier))
                })
                .collect();
            drop(barrier);
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Result<Vec<Quantized>, _>>()
        })
        .map_err(|_| RenderError::WorkerPanicked)?
        .map_err(|_| RenderError::WorkerPanicked)?;

        if self.is_cancelled() {
            warn!("render of {}x{} cancelled", width, height);
            return Err(RenderError::Cancelled);
        }

        for (region, bytes) in finished.into_iter().flatten() {
            for ((i, j), pixel) in region.pixels().zip(bytes) {
                image.put_pixel(i, j, Rgb(pixel));
            }
        }
        Ok(image)
    }

    fn work(
        &self,
        tree: &Tree,
        width: u32,
        height: u32,
        queue: &SegQueue<Region>,
        extrema: &Mutex<Extrema>,
        barrier: WaitGroup,
    ) -> Quantized {
        let mut evaluated = Vec::new();
        let mut local = Extrema::EMPTY;
        while !self.is_cancelled() {
            let region = match queue.pop() {
                Some(region) => region,
                None => break,
            };
            let colors: Vec<Color> = region
                .pixels()
                .map(|(i, j)| tree.evaluate(coordinate(i, width), coordinate(j, height)))
                .collect();
            for &color in &colors {
                local.include(color);
            }
            evaluated.push((region, colors));
            self.completed.fetch_add(1, Ordering::Relaxed);
        }

        lock(extrema).merge(local);
        // Nobody quantizes until every worker has contributed its extrema.
        barrier.wait();
        if self.is_cancelled() {
            return Vec::new();
        }
        let extrema = *lock(extrema);

        evaluated
            .into_iter()
            .map(|(region, colors)| {
                let bytes = colors
                    .into_iter()
                    .map(|color| quantize_color(color, self.rescale, extrema))
                    .collect();
                self.completed.fetch_add(1, Ordering::Relaxed);
                (region, bytes)
            })
            .collect()
    }
}

fn lock(extrema: &Mutex<Extrema>) -> std::sync::MutexGuard<'_, Extrema> {
    match extrema.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FunctionId, ParameterSet};
    use crate::tree::Node;

    fn session(workers: usize, region_size: u32, rescale: Rescale) -> RenderSession {
        RenderSession::new(&RenderConfig {
            width: 0,
            height: 0,
            workers,
            region_size,
            rescale,
        })
    }

    fn gradient() -> Tree {
        Tree::with_root(
            1,
            Node::with_coordinates(FunctionId::Add, ParameterSet::default()),
        )
    }

    #[test]
    fn partition_covers_every_pixel_once() {
        let regions = partition(10, 7, 4);
        assert_eq!(regions.len(), 6);
        let mut seen = vec![0; 70];
        for region in &regions {
            for (i, j) in region.pixels() {
                seen[(j * 10 + i) as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
        assert!(partition(0, 5, 4).is_empty());
    }

    #[test]
    fn quantize_clamps_and_stretches() {
        assert_eq!(quantize(0.5, Rescale::Clamp, Extrema::EMPTY), 128);
        assert_eq!(quantize(1.0, Rescale::Clamp, Extrema::EMPTY), 255);
        let range = Extrema { min: 0.25, max: 0.75 };
        assert_eq!(quantize(0.25, Rescale::MinMax, range), 0);
        assert_eq!(quantize(0.75, Rescale::MinMax, range), 255);
        let flat = Extrema { min: 0.5, max: 0.5 };
        assert_eq!(quantize(0.5, Rescale::MinMax, flat), 128);
    }

    #[test]
    fn coordinates_follow_pixel_layout() {
        let image = render(&gradient(), 4, 2);
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(2, 0), &Rgb([128, 0, 0]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([0, 128, 0]));
    }

    #[test]
    fn session_matches_sequential() {
        let tree = gradient();
        for &rescale in &[Rescale::Clamp, Rescale::MinMax] {
            let expected = render_with(&tree, 37, 23, rescale);
            for &(workers, size) in &[(1, 64), (4, 5), (8, 1)] {
                let image = session(workers, size, rescale).render(&tree, 37, 23).unwrap();
                assert_eq!(image.as_raw(), expected.as_raw());
            }
        }
    }

    #[test]
    fn progress_reaches_one() {
        let session = session(3, 8, Rescale::Clamp);
        assert_eq!(session.progress(), 0.0);
        session.render(&gradient(), 20, 20).unwrap();
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn cancelled_session_stops() {
        let session = session(2, 4, Rescale::Clamp);
        session.cancel();
        assert_eq!(
            session.render(&gradient(), 16, 16).unwrap_err(),
            RenderError::Cancelled
        );
        session.reset();
        assert!(session.render(&gradient(), 16, 16).is_ok());
    }

    #[test]
    fn empty_image() {
        let image = session(2, 4, Rescale::MinMax).render(&gradient(), 0, 0).unwrap();
        assert_eq!(image.dimensions(), (0, 0));
    }
}
