use num::complex::Complex64;
use std::f64::consts::PI;

/// 20·log10(|z|)
pub fn db(z: Complex64) -> f64 {
    20.0 * z.norm().log10()
}

/// Phase in degrees normalised into [0, 360)
pub fn deg_0_360(z: Complex64) -> f64 {
    let deg = z.arg().to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Linear interpolation of the threshold between (x1, y1) and (x2, y2)
pub fn interpolate(x1: f64, x2: f64, y1: f64, y2: f64, x: f64) -> f64 {
    if x2 == x1 {
        return y1;
    }
    y1 + (x - x1) / (x2 - x1) * (y2 - y1)
}

/// Running phase unwrapper.
///
/// The first value is taken as is. Every following value is shifted by a
/// whole number of turns so that it lands within π of the previous
/// unwrapped value.
#[derive(Clone, Debug, Default)]
pub struct PhaseUnwrapper {
    last: Option<f64>,
}

impl PhaseUnwrapper {
    pub fn new() -> PhaseUnwrapper {
        PhaseUnwrapper { last: None }
    }

    /// Feed a raw phase in radians, returns the unwrapped phase in radians
    pub fn push(&mut self, raw: f64) -> f64 {
        let unwrapped = match self.last {
            None => raw,
            Some(prev) => raw + 2.0 * PI * ((prev - raw) / (2.0 * PI)).round(),
        };
        self.last = Some(unwrapped);
        unwrapped
    }
}

/// Unwrap a whole trace of phases (radians)
pub fn unwrap_phase(phases: &[f64]) -> Vec<f64> {
    let mut unwrapper = PhaseUnwrapper::new();
    phases.iter().map(|&p| unwrapper.push(p)).collect()
}

/// Group delay estimate from an unwrapped phase: -φ / (2π·f).
///
/// NaN when `freq` is not positive.
pub fn delay(unwrapped: f64, freq: f64) -> f64 {
    if freq <= 0.0 {
        return f64::NAN;
    }
    -unwrapped / (2.0 * PI * freq)
}
