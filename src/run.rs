//! Calibration run orchestration
//!
//! A run owns the [`StandardSet`] for its whole life: it plans the
//! connection steps, asks the operator to realise each wiring, hands every
//! step to the [`Assembler`] and finally validates the complete set against
//! the limits, if any were given.

use crate::assembler::{Assembler, StepReport};
use crate::config::CalConfig;
use crate::device::CalUnit;
use crate::error::{CalError, Result};
use crate::limits::{validate, LimitFile, ValidationReport};
use crate::planner::{plan, usable_instrument_ports, ConnectionStep};
use crate::source::SweepSource;
use crate::standard::{PortPair, StandardKind, StandardSet};
use tracing::info;

/// Operator-facing events
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    Measuring { kind: StandardKind, ports: Vec<usize> },
    MeasuringThrough { pair: PortPair },
    StepDone { index: usize, total: usize, sweeps: usize },
    Complete { sweeps: usize },
}

/// Whoever changes the wiring between steps: a person or a switch matrix
pub trait Operator {
    /// Realise the wiring of `step`, returns once it is in place
    fn connect(&mut self, step: &ConnectionStep) -> Result<()>;

    fn progress(&mut self, event: &Progress) {
        info!("{:?}", event);
    }
}

/// Operator that only logs; for fixed or automatically switched setups
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingOperator;

impl Operator for LoggingOperator {
    fn connect(&mut self, step: &ConnectionStep) -> Result<()> {
        info!("Connect instrument port -> device port: {}", step);
        Ok(())
    }
}

/// Everything a finished run hands to the exporters
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub standards: StandardSet,
    pub steps: Vec<StepReport>,
    pub validation: Option<ValidationReport>,
}

impl RunOutcome {
    pub fn sweeps(&self) -> usize {
        self.steps.iter().map(|s| s.sweeps).sum()
    }
}

pub struct CalibrationRun<'a, U: ?Sized, S: ?Sized, O: ?Sized> {
    config: CalConfig,
    unit: &'a mut U,
    source: &'a mut S,
    operator: &'a mut O,
}

impl<'a, U, S, O> CalibrationRun<'a, U, S, O>
where
    U: CalUnit + ?Sized,
    S: SweepSource + ?Sized,
    O: Operator + ?Sized,
{
    pub fn new(config: CalConfig, unit: &'a mut U, source: &'a mut S, operator: &'a mut O) -> Self {
        Self {
            config,
            unit,
            source,
            operator,
        }
    }

    /// Instrument channels that will be used, after capping
    fn instrument_ports(&self) -> Result<usize> {
        let reported = usable_instrument_ports(self.source.ports())?;
        Ok(reported.min(self.config.max_instrument_ports))
    }

    /// Acquire every standard and, when `limits` is given, validate them.
    ///
    /// Any error aborts the remaining plan. Limits are only checked once all
    /// measurements are in.
    pub fn execute(mut self, limits: Option<&LimitFile>) -> Result<RunOutcome> {
        self.config.validate()?;
        if let Some(limits) = limits {
            limits.check()?;
        }
        if !self.source.check_if_ready() {
            return Err(CalError::NotReady(self.source.info()));
        }
        let channels = self.instrument_ports()?;
        let steps = plan(self.config.device_ports, channels)?;
        info!(
            "{} using {} instrument ports, {} connection steps",
            self.source.info(),
            channels,
            steps.len()
        );

        let mut standards = StandardSet::new();
        let mut reports = Vec::with_capacity(steps.len());
        let total = steps.len();
        {
            let mut assembler = Assembler::new(
                &mut *self.unit,
                &mut *self.source,
                channels,
                self.config.device_ports,
            )
            .with_stability(self.config.stability_timeout(), self.config.stability_poll());

            for (index, step) in steps.iter().enumerate() {
                self.operator.connect(step)?;
                let report = assembler.measure_step(step, &mut standards, &mut *self.operator)?;
                self.operator.progress(&Progress::StepDone {
                    index,
                    total,
                    sweeps: report.sweeps,
                });
                reports.push(report);
            }
        }

        let sweeps = reports.iter().map(|r| r.sweeps).sum();
        self.operator.progress(&Progress::Complete { sweeps });

        let validation = match limits {
            Some(limits) => Some(validate(&standards, limits)?),
            None => None,
        };

        Ok(RunOutcome {
            standards,
            steps: reports,
            validation,
        })
    }
}
