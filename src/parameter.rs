use core::fmt;
use num::complex::Complex64;
use regex::Regex;
use simple_error::{bail, SimpleError};
use std::str::FromStr;
use std::sync::OnceLock;

fn re_sparam() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^S([1-9])([1-9])$").expect("Invalid regex!"))
}

/// Label of one S-parameter, `S<to><from>`, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SParam {
    pub to: usize,
    pub from: usize,
}

impl SParam {
    pub fn new(to: usize, from: usize) -> SParam {
        SParam { to, from }
    }

    /// Every `Sij` for `i, j` in `[1, channels]`, row major
    pub fn all(channels: usize) -> Vec<SParam> {
        let mut out = Vec::with_capacity(channels * channels);
        for i in 1..=channels {
            for j in 1..=channels {
                out.push(SParam::new(i, j));
            }
        }
        out
    }

    pub fn is_reflection(&self) -> bool {
        self.to == self.from
    }
}

impl FromStr for SParam {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(caps) = re_sparam().captures(s.trim()) else {
            bail!("string not a valid S-parameter label");
        };
        // both groups are single decimal digits
        let to = caps[1].parse::<usize>().map_err(SimpleError::from)?;
        let from = caps[2].parse::<usize>().map_err(SimpleError::from)?;
        Ok(SParam { to, from })
    }
}

impl fmt::Display for SParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}{}", self.to, self.from)
    }
}

/// Number format of a Touchstone data pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataFormat {
    #[default]
    RI,
    MA,
    DB,
}

impl DataFormat {
    pub fn to_str(&self) -> &str {
        match self {
            DataFormat::RI => "RI",
            DataFormat::MA => "MA",
            DataFormat::DB => "DB",
        }
    }

    pub fn parse(&self, x: f64, y: f64) -> Complex64 {
        match self {
            DataFormat::RI => Complex64::new(x, y),
            DataFormat::MA => Complex64::from_polar(x, y.to_radians()),
            DataFormat::DB => Complex64::from_polar(10_f64.powf(x / 20.0), y.to_radians()),
        }
    }
}

impl FromStr for DataFormat {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ri" => Ok(DataFormat::RI),
            "ma" => Ok(DataFormat::MA),
            "db" => Ok(DataFormat::DB),
            _ => bail!("string not recognized"),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_sparam() {
        assert_eq!(SParam::from_str("S21").unwrap(), SParam::new(2, 1));
        assert_eq!(SParam::from_str("s34").unwrap(), SParam::new(3, 4));
        assert_eq!(SParam::new(1, 2).to_string(), "S12");
        assert!(SParam::from_str("S1").is_err());
        assert!(SParam::from_str("Z11").is_err());
        assert!(SParam::new(2, 2).is_reflection());
        assert!(!SParam::new(2, 1).is_reflection());
    }

    #[test]
    fn test_sparam_all() {
        let all = SParam::all(3);
        assert_eq!(all.len(), 9);
        assert_eq!(all[0], SParam::new(1, 1));
        assert_eq!(all[5], SParam::new(2, 3));
    }

    #[test]
    fn test_data_format() {
        let ri = ["RI", "ri"];
        let ma = ["MA", "ma"];
        let db = ["DB", "dB", "db"];

        for s in ri.iter() {
            assert_eq!(DataFormat::from_str(s).unwrap(), DataFormat::RI);
        }
        for s in ma.iter() {
            assert_eq!(DataFormat::from_str(s).unwrap(), DataFormat::MA);
        }
        for s in db.iter() {
            assert_eq!(DataFormat::from_str(s).unwrap(), DataFormat::DB);
        }

        let c = DataFormat::MA.parse(2.0, 90.0);
        assert!(approx_eq!(f64, c.re, 0.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, c.im, 2.0, epsilon = 1e-12));
        let c = DataFormat::DB.parse(-20.0, 0.0);
        assert!(approx_eq!(f64, c.re, 0.1, epsilon = 1e-12));
    }
}
