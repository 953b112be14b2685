use simple_error::{bail, SimpleError};
use std::{fmt, str::FromStr};

/// Frequency scaling used by Touchstone option lines and upload records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scale {
    #[default]
    Base,
    Kilo,
    Mega,
    Giga,
    Tera,
}

impl Scale {
    pub fn to_str(&self) -> &str {
        match self {
            Scale::Base => "Hz",
            Scale::Kilo => "kHz",
            Scale::Mega => "MHz",
            Scale::Giga => "GHz",
            Scale::Tera => "THz",
        }
    }

    /// Provides multiplier for scale
    /// Scale::Giga = 1e9
    pub fn multiplier(&self) -> f64 {
        match self {
            Scale::Base => 1.0,
            Scale::Kilo => 1e3,
            Scale::Mega => 1e6,
            Scale::Giga => 1e9,
            Scale::Tera => 1e12,
        }
    }

    /// Hz -> scaled unit
    pub fn scale(&self, val: f64) -> f64 {
        val / self.multiplier()
    }

    /// scaled unit -> Hz
    pub fn unscale(&self, val: f64) -> f64 {
        val * self.multiplier()
    }
}

impl FromStr for Scale {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hz" | "" => Ok(Scale::Base),
            "khz" | "k" => Ok(Scale::Kilo),
            "mhz" | "m" => Ok(Scale::Mega),
            "ghz" | "g" => Ok(Scale::Giga),
            "thz" | "t" => Ok(Scale::Tera),
            _ => bail!("string not a valid frequency unit"),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}
