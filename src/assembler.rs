//! Measurement assembly
//!
//! Turns instrument sweeps, indexed by instrument channel, into per-port and
//! per-pair standards indexed by device port, skipping every standard that is
//! already present in the [`StandardSet`].

use crate::device::{CalUnit, PortState};
use crate::error::{CalError, Result};
use crate::parameter::SParam;
use crate::planner::ConnectionStep;
use crate::run::{Operator, Progress};
use crate::source::SweepSource;
use crate::standard::{coefficient_name, PortPair, StandardKind, StandardSet, ThroughSet};
use crate::sweep::Sweep;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default bound on the thermal stability wait
pub const STABILITY_TIMEOUT: Duration = Duration::from_secs(180);

/// Default interval between stability polls
pub const STABILITY_POLL: Duration = Duration::from_millis(100);

/// Outcome of one connection step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub sweeps: usize,
    /// Coefficient names stored during this step
    pub stored: Vec<String>,
}

/// Poll the unit until it reports thermal stability.
///
/// Never waits longer than `timeout`; fails with
/// [`CalError::TemperatureTimeout`] when the bound is exceeded.
pub fn wait_for_stability<U>(unit: &mut U, timeout: Duration, poll: Duration) -> Result<()>
where
    U: CalUnit + ?Sized,
{
    if unit.temperature_stable()? {
        return Ok(());
    }
    let start = Instant::now();
    info!(
        "Waiting for temperature to stabilize, currently {:.2} °C",
        unit.temperature()?
    );
    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(CalError::TemperatureTimeout(timeout.as_secs_f64()));
        }
        thread::sleep(poll.min(timeout - elapsed));
        if unit.temperature_stable()? {
            info!(
                "Temperature stable at {:.2} °C after {:.1} s",
                unit.temperature()?,
                start.elapsed().as_secs_f64()
            );
            return Ok(());
        }
    }
}

fn port_state(kind: StandardKind) -> PortState {
    match kind {
        StandardKind::Open => PortState::Open,
        StandardKind::Short => PortState::Short,
        StandardKind::Load => PortState::Load,
        StandardKind::Through => PortState::None,
    }
}

pub struct Assembler<'a, U: ?Sized, S: ?Sized> {
    unit: &'a mut U,
    source: &'a mut S,
    channels: usize,
    device_ports: usize,
    stability_timeout: Duration,
    stability_poll: Duration,
}

impl<'a, U, S> Assembler<'a, U, S>
where
    U: CalUnit + ?Sized,
    S: SweepSource + ?Sized,
{
    /// `channels` is the number of instrument channels every sweep must
    /// cover, `device_ports` the number of ports reset between sweeps.
    pub fn new(unit: &'a mut U, source: &'a mut S, channels: usize, device_ports: usize) -> Self {
        Self {
            unit,
            source,
            channels,
            device_ports,
            stability_timeout: STABILITY_TIMEOUT,
            stability_poll: STABILITY_POLL,
        }
    }

    pub fn with_stability(mut self, timeout: Duration, poll: Duration) -> Self {
        self.stability_timeout = timeout;
        self.stability_poll = poll;
        self
    }

    fn sweep(&mut self) -> Result<Sweep> {
        let sweep = self.source.measure()?;
        sweep.sanity_check(self.channels)?;
        Ok(sweep)
    }

    /// Acquire every standard of `step` that is not yet in `set`.
    ///
    /// A step whose standards are all present takes no sweep and does not
    /// touch the unit.
    pub fn measure_step<O>(
        &mut self,
        step: &ConnectionStep,
        set: &mut StandardSet,
        operator: &mut O,
    ) -> Result<StepReport>
    where
        O: Operator + ?Sized,
    {
        let ports = step.ports();
        let mut report = StepReport::default();

        let one_port: Vec<(StandardKind, Vec<usize>)> = StandardKind::ONE_PORT
            .iter()
            .map(|&kind| (kind, set.missing(kind, &ports)))
            .filter(|(_, missing)| !missing.is_empty())
            .collect();
        let throughs = set.missing_throughs(&ports);
        if one_port.is_empty() && throughs.is_empty() {
            debug!("Step {} fully cached, skipping", step);
            return Ok(report);
        }

        wait_for_stability(&mut *self.unit, self.stability_timeout, self.stability_poll)?;

        for (kind, missing) in one_port {
            self.unit.reset_ports(self.device_ports)?;
            for &port in ports.iter() {
                self.unit.set_port(port, port_state(kind))?;
            }
            operator.progress(&Progress::Measuring {
                kind,
                ports: ports.clone(),
            });
            let sweep = self.sweep()?;
            report.sweeps += 1;
            for port in missing {
                let ch = channel(step, port)?;
                let trace = sweep.trace(SParam::new(ch, ch))?.clone();
                if set.insert(kind, port, trace) {
                    report.stored.push(coefficient_name(kind, &port.to_string()));
                }
            }
        }

        for pair in throughs {
            self.unit.reset_ports(self.device_ports)?;
            self.unit
                .set_port(pair.first(), PortState::Through(pair.second()))?;
            operator.progress(&Progress::MeasuringThrough { pair });
            let sweep = self.sweep()?;
            report.sweeps += 1;
            let through = through_from_sweep(&sweep, step, pair)?;
            if set.insert_through(pair, through) {
                report
                    .stored
                    .push(coefficient_name(StandardKind::Through, &pair.to_string()));
            }
        }

        self.unit.reset_ports(self.device_ports)?;
        Ok(report)
    }
}

fn channel(step: &ConnectionStep, port: usize) -> Result<usize> {
    step.channel_of(port).ok_or_else(|| {
        CalError::InvalidConfig(format!("device port {} is not wired in step {}", port, step))
    })
}

/// Re-index the four traces of `pair` from instrument space into pair-local
/// space, the lower device port becoming local port 1.
pub fn through_from_sweep(sweep: &Sweep, step: &ConnectionStep, pair: PortPair) -> Result<ThroughSet> {
    let p = channel(step, pair.first())?;
    let q = channel(step, pair.second())?;
    Ok(ThroughSet {
        s11: sweep.trace(SParam::new(p, p))?.clone(),
        s12: sweep.trace(SParam::new(p, q))?.clone(),
        s21: sweep.trace(SParam::new(q, p))?.clone(),
        s22: sweep.trace(SParam::new(q, q))?.clone(),
    })
}
