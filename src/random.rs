use crate::color::Color;
use rand::distributions::{Distribution, Standard};
use rand::Rng;

/// A scalar literal, uniform in `[0, 1]`.
#[derive(Copy, Clone, Debug)]
pub struct Scalar;

impl Distribution<Color> for Scalar {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        Color::scalar(rng.gen_range(0.0..=1.0))
    }
}

/// A color literal of unit magnitude (or black).
impl Distribution<Color> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        Color::new(
            rng.gen_range(0.0..=1.0),
            rng.gen_range(0.0..=1.0),
            rng.gen_range(0.0..=1.0),
        )
        .normalized()
    }
}

/// Moves a scalar by up to `range` in either direction, folded back into `[0, 1]`.
pub fn perturb_scalar<R: Rng + ?Sized>(rng: &mut R, scalar: Color, range: f64) -> Color {
    Color::scalar(scalar.r + offset(rng, range)).folded()
}

/// Uniform between the two parents.
pub fn blend_scalar<R: Rng + ?Sized>(rng: &mut R, a: Color, b: Color) -> Color {
    Color::scalar(between(rng, a.r, b.r))
}

pub fn perturb_color<R: Rng + ?Sized>(rng: &mut R, color: Color, range: f64) -> Color {
    Color::new(
        color.r + offset(rng, range),
        color.g + offset(rng, range),
        color.b + offset(rng, range),
    )
    .folded()
    .normalized()
}

/// Each channel uniform between the parents' channels.
pub fn blend_color<R: Rng + ?Sized>(rng: &mut R, a: Color, b: Color) -> Color {
    Color::new(
        between(rng, a.r, b.r),
        between(rng, a.g, b.g),
        between(rng, a.b, b.b),
    )
    .normalized()
}

fn offset<R: Rng + ?Sized>(rng: &mut R, range: f64) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-range..=range)
}

fn between<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    let (min, max) = if a <= b { (a, b) } else { (b, a) };
    if min == max {
        return min;
    }
    rng.gen_range(min..=max)
}
