use serde::{Deserialize, Serialize};

/// Three floating point channels. Values produced by functions are folded into `[0, 1]`,
/// see [`Color::folded`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// A scalar lives in the red channel.
    pub const fn scalar(v: f64) -> Self {
        Self::new(v, 0.0, 0.0)
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.r), f(self.g), f(self.b))
    }

    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::new(f(self.r, other.r), f(self.g, other.g), f(self.b, other.b))
    }

    pub fn channels(self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    pub fn sum(self) -> f64 {
        self.r + self.g + self.b
    }

    pub fn magnitude(self) -> f64 {
        (self.r * self.r + self.g * self.g + self.b * self.b).sqrt()
    }

    /// Unit magnitude, or unchanged if black.
    pub fn normalized(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || !magnitude.is_finite() {
            return self;
        }
        self.map(|c| c / magnitude)
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    /// Folds every channel into `[0, 1]`: absolute value, then drop the integer part of
    /// anything above one. Non-finite channels become zero.
    pub fn folded(self) -> Self {
        self.map(fold)
    }
}

fn fold(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let v = v.abs();
    if v > 1.0 {
        v - v.trunc()
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_keeps_unit_interval() {
        let c = Color::new(-0.25, 3.5, 1.0).folded();
        assert_eq!(c, Color::new(0.25, 0.5, 1.0));
    }

    #[test]
    fn fold_zeroes_non_finite() {
        let c = Color::new(f64::NAN, f64::INFINITY, f64::NEG_INFINITY).folded();
        assert_eq!(c, Color::BLACK);
    }

    #[test]
    fn normalized_has_unit_magnitude() {
        let c = Color::new(3.0, 4.0, 0.0).normalized();
        assert!((c.magnitude() - 1.0).abs() < 1e-12);
        assert_eq!(Color::BLACK.normalized(), Color::BLACK);
    }
}
