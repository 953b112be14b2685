use super::{CalUnit, PortState, MAX_COMMENTS};
use crate::error::{CalError, Result};
use std::collections::BTreeMap;

/// Coefficient stored by [`SimulatedUnit`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoredCoefficient {
    pub comments: Vec<String>,
    pub points: Vec<Vec<f64>>,
}

/// In-memory calibration unit.
///
/// Behaves like the firmware where it matters to a calibration run: factory
/// coefficients need an explicit unlock, comments are only accepted before
/// the first point and are capped at [`MAX_COMMENTS`], and the temperature
/// reports stable after a configurable number of polls.
#[derive(Clone, Debug)]
pub struct SimulatedUnit {
    serial: String,
    ports: Vec<PortState>,
    temperature: f64,
    polls_until_stable: Option<usize>,
    factory_writable: bool,
    coefficients: BTreeMap<String, StoredCoefficient>,
    open: Option<String>,
    history: Vec<(usize, PortState)>,
}

impl SimulatedUnit {
    pub fn new(ports: usize) -> SimulatedUnit {
        SimulatedUnit {
            serial: String::from("SIM0001"),
            ports: vec![PortState::None; ports],
            temperature: 35.0,
            polls_until_stable: Some(0),
            factory_writable: false,
            coefficients: BTreeMap::new(),
            open: None,
            history: vec![],
        }
    }

    /// Report stable after `polls` unstable answers; `None` never stabilises
    pub fn with_stability_after(mut self, polls: Option<usize>) -> SimulatedUnit {
        self.polls_until_stable = polls;
        self
    }

    pub fn port_state(&self, port: usize) -> Option<PortState> {
        self.ports.get(port.wrapping_sub(1)).copied()
    }

    /// Every `set_port` call received, in order
    pub fn history(&self) -> &[(usize, PortState)] {
        &self.history
    }

    pub fn coefficient(&self, class: &str, name: &str) -> Option<&StoredCoefficient> {
        self.coefficients.get(&key(class, name))
    }

    pub fn coefficients(&self) -> &BTreeMap<String, StoredCoefficient> {
        &self.coefficients
    }

    fn open_coefficient(&mut self, cmd: &str) -> Result<&mut StoredCoefficient> {
        let name = self
            .open
            .clone()
            .ok_or_else(|| CalError::DeviceRejected(cmd.to_string()))?;
        Ok(self.coefficients.entry(name).or_default())
    }
}

fn key(class: &str, name: &str) -> String {
    format!("{}/{}", class, name)
}

impl CalUnit for SimulatedUnit {
    fn identify(&mut self) -> Result<String> {
        Ok(self.serial.clone())
    }

    fn enable_factory_write(&mut self) -> Result<()> {
        self.factory_writable = true;
        Ok(())
    }

    fn clear_factory(&mut self) -> Result<()> {
        if !self.factory_writable {
            return Err(CalError::DeviceRejected(":FACT:DEL".to_string()));
        }
        self.coefficients.retain(|k, _| !k.starts_with("FACTORY/"));
        Ok(())
    }

    fn set_port(&mut self, port: usize, state: PortState) -> Result<()> {
        let cmd = format!(":PORT {} {}", port, state);
        if port == 0 || port > self.ports.len() {
            return Err(CalError::DeviceRejected(cmd));
        }
        if let PortState::Through(partner) = state {
            if partner == port || partner == 0 || partner > self.ports.len() {
                return Err(CalError::DeviceRejected(cmd));
            }
            self.ports[partner - 1] = PortState::Through(port);
        }
        self.ports[port - 1] = state;
        self.history.push((port, state));
        Ok(())
    }

    fn temperature(&mut self) -> Result<f64> {
        Ok(self.temperature)
    }

    fn temperature_stable(&mut self) -> Result<bool> {
        match self.polls_until_stable {
            None => Ok(false),
            Some(0) => Ok(true),
            Some(n) => {
                self.polls_until_stable = Some(n - 1);
                Ok(false)
            }
        }
    }

    fn create_coefficient(&mut self, class: &str, name: &str) -> Result<()> {
        let cmd = format!(":COEFF:CREATE {} {}", class, name);
        if self.open.is_some() || (class == "FACTORY" && !self.factory_writable) {
            return Err(CalError::DeviceRejected(cmd));
        }
        let k = key(class, name);
        self.coefficients.insert(k.clone(), StoredCoefficient::default());
        self.open = Some(k);
        Ok(())
    }

    fn add_comment(&mut self, comment: &str) -> Result<()> {
        let cmd = format!(":COEFF:ADD_COMMENT {}", comment);
        let coeff = self.open_coefficient(&cmd)?;
        if !coeff.points.is_empty() || coeff.comments.len() >= MAX_COMMENTS {
            return Err(CalError::DeviceRejected(cmd));
        }
        coeff.comments.push(comment.to_string());
        Ok(())
    }

    fn add_point(&mut self, values: &[f64]) -> Result<()> {
        let coeff = self.open_coefficient(":COEFF:ADD")?;
        coeff.points.push(values.to_vec());
        Ok(())
    }

    fn finish_coefficient(&mut self) -> Result<()> {
        if self.open.take().is_none() {
            return Err(CalError::DeviceRejected(":COEFF:FIN".to_string()));
        }
        Ok(())
    }
}
