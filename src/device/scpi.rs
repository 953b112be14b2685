use super::{CalUnit, PortState};
use crate::error::{CalError, Result};
use std::io::{self, BufRead, Write};
use tracing::debug;

const ERROR_TOKEN: &str = "ERROR";

/// Calibration unit driven over a line oriented byte stream.
///
/// The stream is expected to carry its own read timeout; a read that times
/// out or reaches end of stream is reported as [`CalError::NoResponse`].
pub struct ScpiUnit<T> {
    io_handle: T,
    line_ending: &'static str,
    vendor: String,
}

impl<T> ScpiUnit<T>
where
    T: BufRead + Write,
{
    pub fn new(io_handle: T, vendor: &str) -> Self {
        Self {
            io_handle,
            line_ending: "\r\n",
            vendor: vendor.to_string(),
        }
    }

    pub fn into_inner(self) -> T {
        self.io_handle
    }

    /// Send one command and return the trimmed reply
    pub fn query(&mut self, cmd: &str) -> Result<String> {
        debug!("SCPI {}", cmd);
        self.io_handle
            .write_all(format!("{}{}", cmd, self.line_ending).as_bytes())?;
        self.io_handle.flush()?;

        let mut line = String::new();
        let read = match self.io_handle.read_line(&mut line) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => 0,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            return Err(CalError::NoResponse(cmd.to_string()));
        }
        let resp = line.trim();
        if resp == ERROR_TOKEN {
            return Err(CalError::DeviceRejected(cmd.to_string()));
        }
        Ok(resp.to_string())
    }
}

impl<T> CalUnit for ScpiUnit<T>
where
    T: BufRead + Write,
{
    fn identify(&mut self) -> Result<String> {
        let cmd = "*IDN?";
        let resp = self.query(cmd)?;
        // newer firmware separates fields with ',', older with '_'
        let (fields, serial_idx): (Vec<&str>, usize) = if resp.contains(',') {
            (resp.split(',').collect(), 2)
        } else {
            (resp.split('_').collect(), 1)
        };
        if fields[0] != self.vendor {
            return Err(CalError::UnexpectedResponse {
                command: cmd.to_string(),
                response: resp.clone(),
            });
        }
        match fields.get(serial_idx) {
            Some(serial) => Ok(serial.trim().to_string()),
            None => Err(CalError::UnexpectedResponse {
                command: cmd.to_string(),
                response: resp.clone(),
            }),
        }
    }

    fn enable_factory_write(&mut self) -> Result<()> {
        self.query(":FACT:ENABLEWRITE I_AM_SURE").map(|_| ())
    }

    fn clear_factory(&mut self) -> Result<()> {
        self.query(":FACT:DEL").map(|_| ())
    }

    fn set_port(&mut self, port: usize, state: PortState) -> Result<()> {
        self.query(&format!(":PORT {} {}", port, state)).map(|_| ())
    }

    fn temperature(&mut self) -> Result<f64> {
        let cmd = ":TEMP?";
        let resp = self.query(cmd)?;
        resp.parse::<f64>().map_err(|_| CalError::UnexpectedResponse {
            command: cmd.to_string(),
            response: resp,
        })
    }

    fn temperature_stable(&mut self) -> Result<bool> {
        let cmd = ":TEMP:STABLE?";
        let resp = self.query(cmd)?;
        match resp.as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(CalError::UnexpectedResponse {
                command: cmd.to_string(),
                response: resp,
            }),
        }
    }

    fn create_coefficient(&mut self, class: &str, name: &str) -> Result<()> {
        self.query(&format!(":COEFF:CREATE {} {}", class, name))
            .map(|_| ())
    }

    fn add_comment(&mut self, comment: &str) -> Result<()> {
        self.query(&format!(":COEFF:ADD_COMMENT {}", comment))
            .map(|_| ())
    }

    fn add_point(&mut self, values: &[f64]) -> Result<()> {
        let args: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.query(&format!(":COEFF:ADD {}", args.join(" ")))
            .map(|_| ())
    }

    fn finish_coefficient(&mut self) -> Result<()> {
        self.query(":COEFF:FIN").map(|_| ())
    }
}
