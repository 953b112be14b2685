//! Sweep sources
//!
//! A sweep source is the vector network analyser side of a calibration run.
//! The engine only needs four capabilities from it; which concrete source is
//! used is decided when the run is built.

use crate::error::Result;
use crate::parameter::SParam;
use crate::sweep::Sweep;
use crate::trace::{Sample, Trace};
use num::complex::Complex64;
use std::f64::consts::PI;

pub trait SweepSource {
    /// Readiness check and one-time initialisation, called once per run
    fn check_if_ready(&mut self) -> bool;

    /// Number of instrument channels
    fn ports(&self) -> usize;

    /// Free-form identification (model, serial number)
    fn info(&self) -> String {
        String::new()
    }

    /// Start one sweep and block until it is done.
    ///
    /// Must return every `Sij` for `i, j` in `[1, ports()]` and never a
    /// previous result.
    fn measure(&mut self) -> Result<Sweep>;
}

/// Deterministic stand-in for an analyser.
///
/// Reflections are a lossy delay line per channel, transmissions a weaker
/// delay line. Each sweep rotates the data slightly so consecutive results
/// differ.
#[derive(Clone, Debug)]
pub struct SimulatedVna {
    ports: usize,
    points: usize,
    start: f64,
    stop: f64,
    sweeps: usize,
}

impl SimulatedVna {
    pub fn new(ports: usize) -> SimulatedVna {
        SimulatedVna {
            ports,
            points: 2,
            start: 30e3,
            stop: 6e9,
            sweeps: 0,
        }
    }

    pub fn with_points(mut self, points: usize) -> SimulatedVna {
        self.points = points;
        self
    }

    pub fn with_span(mut self, start: f64, stop: f64) -> SimulatedVna {
        self.start = start;
        self.stop = stop;
        self
    }

    /// Number of sweeps taken so far
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    fn freq(&self, i: usize) -> f64 {
        if self.points < 2 {
            return self.start;
        }
        self.start + (self.stop - self.start) * i as f64 / (self.points - 1) as f64
    }

    fn value(&self, param: SParam, freq: f64) -> Complex64 {
        let (mag, tau) = if param.is_reflection() {
            (0.9, 50e-12 * param.to as f64)
        } else {
            (0.5, 100e-12 * (param.to + param.from) as f64)
        };
        let jitter = 1e-3 * self.sweeps as f64;
        Complex64::from_polar(mag, -2.0 * PI * freq * tau + jitter)
    }
}

impl SweepSource for SimulatedVna {
    fn check_if_ready(&mut self) -> bool {
        self.points > 0
    }

    fn ports(&self) -> usize {
        self.ports
    }

    fn info(&self) -> String {
        format!("Simulated VNA, {} ports, {} points", self.ports, self.points)
    }

    fn measure(&mut self) -> Result<Sweep> {
        let sweep = SParam::all(self.ports)
            .into_iter()
            .map(|param| {
                let trace: Trace = (0..self.points)
                    .map(|i| {
                        let f = self.freq(i);
                        Sample::new(f, self.value(param, f))
                    })
                    .collect();
                (param, trace)
            })
            .collect();
        self.sweeps += 1;
        Ok(sweep)
    }
}
