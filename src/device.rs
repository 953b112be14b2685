//! Calibration unit control
//!
//! The calibration unit switches each of its physical ports between the
//! reference standards and stores the resulting coefficients. It is driven
//! through a simple line based command/response protocol where every
//! command either answers with a value or with an explicit error token.

use crate::error::Result;
use core::fmt;

pub mod scpi;
pub mod sim;

pub use self::scpi::ScpiUnit;
pub use self::sim::SimulatedUnit;

/// Most comments the unit keeps per coefficient file
pub const MAX_COMMENTS: usize = 100;

/// Termination applied to one physical port
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PortState {
    #[default]
    None,
    Open,
    Short,
    Load,
    /// Connected through to the given partner port
    Through(usize),
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::None => write!(f, "NONE"),
            PortState::Open => write!(f, "OPEN"),
            PortState::Short => write!(f, "SHORT"),
            PortState::Load => write!(f, "LOAD"),
            PortState::Through(partner) => write!(f, "THROUGH {}", partner),
        }
    }
}

pub trait CalUnit {
    /// Query the identification string, returns the serial number
    fn identify(&mut self) -> Result<String>;

    /// Unlock the factory coefficient partition
    fn enable_factory_write(&mut self) -> Result<()>;

    /// Delete every factory coefficient
    fn clear_factory(&mut self) -> Result<()>;

    fn set_port(&mut self, port: usize, state: PortState) -> Result<()>;

    /// Put ports `1..=ports` back to `NONE`
    fn reset_ports(&mut self, ports: usize) -> Result<()> {
        for port in 1..=ports {
            self.set_port(port, PortState::None)?;
        }
        Ok(())
    }

    /// Current temperature in °C
    fn temperature(&mut self) -> Result<f64>;

    fn temperature_stable(&mut self) -> Result<bool>;

    fn create_coefficient(&mut self, class: &str, name: &str) -> Result<()>;

    fn add_comment(&mut self, comment: &str) -> Result<()>;

    fn add_point(&mut self, values: &[f64]) -> Result<()>;

    fn finish_coefficient(&mut self) -> Result<()>;
}
