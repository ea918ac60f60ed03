//! Hash based 3D gradient noise and a turbulence sum over octaves.
//!
//! The lattice gradients come from an integer hash instead of a permutation table so
//! there is no shared state to initialize and every octave can use its own seed.

fn hash(x: i64, y: i64, z: i64, seed: u32) -> u32 {
    let mut h = seed
        ^ (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    h ^= h >> 12;
    h = h.wrapping_mul(0x297a_2d39);
    h ^= h >> 15;
    h
}

// One of the twelve cube edge directions, dotted with the offset.
fn gradient(hash: u32, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Gradient noise, roughly in `[-1, 1]`, zero on integer lattice points.
pub fn gradient_noise3(x: f64, y: f64, z: f64, seed: u32) -> f64 {
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return 0.0;
    }

    let (x0, y0, z0) = (x.floor(), y.floor(), z.floor());
    let (xi, yi, zi) = (x0 as i64, y0 as i64, z0 as i64);
    let (fx, fy, fz) = (x - x0, y - y0, z - z0);
    let (u, v, w) = (fade(fx), fade(fy), fade(fz));

    let corner = |dx: i64, dy: i64, dz: i64| {
        gradient(
            hash(xi + dx, yi + dy, zi + dz, seed),
            fx - dx as f64,
            fy - dy as f64,
            fz - dz as f64,
        )
    };

    lerp(
        w,
        lerp(
            v,
            lerp(u, corner(0, 0, 0), corner(1, 0, 0)),
            lerp(u, corner(0, 1, 0), corner(1, 1, 0)),
        ),
        lerp(
            v,
            lerp(u, corner(0, 0, 1), corner(1, 0, 1)),
            lerp(u, corner(0, 1, 1), corner(1, 1, 1)),
        ),
    )
}

/// Sum of `|noise|` over `octaves`, frequency scaled by `lacunarity` and amplitude by
/// `gain` each octave.
pub fn turbulence3(x: f64, y: f64, z: f64, lacunarity: f64, gain: f64, octaves: u32) -> f64 {
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut sum = 0.0;
    for octave in 0..octaves {
        let n = gradient_noise3(x * frequency, y * frequency, z * frequency, octave);
        sum += n.abs() * amplitude;
        frequency *= lacunarity;
        amplitude *= gain;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_on_lattice() {
        for &(x, y, z) in &[(0.0, 0.0, 0.0), (3.0, -2.0, 7.0), (100.0, 5.0, 1.0)] {
            assert_eq!(gradient_noise3(x, y, z, 0), 0.0);
        }
    }

    #[test]
    fn bounded_and_deterministic() {
        for i in 0..500 {
            let x = i as f64 * 0.173;
            let y = i as f64 * 0.291 - 20.0;
            let n = gradient_noise3(x, y, 0.52342, 3);
            assert!(n.abs() <= 2.0, "{}", n);
            assert_eq!(n, gradient_noise3(x, y, 0.52342, 3));
        }
    }

    #[test]
    fn varies_between_lattice_points() {
        let samples: Vec<f64> = (0..64)
            .map(|i| gradient_noise3(i as f64 * 0.37 + 0.1, 0.4, 0.7, 1))
            .collect();
        assert!(samples.iter().any(|&n| n > 0.05));
        assert!(samples.iter().any(|&n| n < -0.05));
    }

    #[test]
    fn turbulence_is_non_negative_and_finite() {
        for i in 0..200 {
            let t = turbulence3(i as f64 * 1.7, i as f64 * 0.3, 0.21045, 6.0, 2.0, 8);
            assert!(t >= 0.0 && t.is_finite());
        }
        assert_eq!(turbulence3(0.3, 0.3, 0.3, 2.0, 0.5, 0), 0.0);
    }
}
