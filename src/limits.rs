//! Limit validation
//!
//! Limits are piecewise-linear thresholds over frequency, grouped by
//! category. Each category selects a set of measurements out of a finished
//! [`StandardSet`]; each limit of the category is then checked against every
//! sample of those measurements that falls into its frequency range.
//!
//! [`validate`] stops at the first violation with
//! [`CalError::LimitViolation`]; [`validate_all`] keeps going and lists every
//! violation in the report. Unknown categories are skipped. Unknown limit types or bounds inside a
//! known category are configuration errors.

use crate::error::{CalError, Result};
use crate::math::{db, deg_0_360, delay, interpolate, PhaseUnwrapper};
use crate::standard::{StandardKind, StandardSet};
use crate::trace::Trace;
use core::fmt;
use num::complex::Complex64;
use serde::{Deserialize, Serialize};
use simple_error::{bail, SimpleError};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Derived quantity a limit constrains
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitType {
    /// 20·log10|S|
    Db,
    /// Phase in degrees within [0, 360)
    Phase,
    /// Group delay in seconds from the unwrapped phase
    Delay,
}

impl LimitType {
    pub fn to_str(&self) -> &str {
        match self {
            LimitType::Db => "dB",
            LimitType::Phase => "phase",
            LimitType::Delay => "delay",
        }
    }
}

impl FromStr for LimitType {
    type Err = SimpleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "db" => Ok(LimitType::Db),
            "phase" => Ok(LimitType::Phase),
            "delay" => Ok(LimitType::Delay),
            _ => bail!("unknown limit type"),
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    /// true when `measured` violates the threshold. An undefined (NaN)
    /// measurement never passes.
    pub fn violated(&self, measured: f64, limit: f64) -> bool {
        if measured.is_nan() {
            return true;
        }
        match self {
            Bound::Min => measured < limit,
            Bound::Max => measured > limit,
        }
    }
}

impl FromStr for Bound {
    type Err = SimpleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(Bound::Min),
            "max" => Ok(Bound::Max),
            _ => bail!("unknown limit bound"),
        }
    }
}

/// Measurement groups a limit category selects
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Open,
    Short,
    Load,
    ThruReflection,
    ThruTransmission,
    OpenShortPhase,
}

impl Category {
    pub fn to_str(&self) -> &str {
        match self {
            Category::Open => "OPEN",
            Category::Short => "SHORT",
            Category::Load => "LOAD",
            Category::ThruReflection => "THRU REFLECTION",
            Category::ThruTransmission => "THRU TRANSMISSION",
            Category::OpenShortPhase => "OPEN SHORT PHASE",
        }
    }

    /// Raw phase in (-π, π]. Short circuits reflect with an inherent 180°
    /// phase which is rotated out first.
    fn phase(&self, value: Complex64) -> f64 {
        match self {
            Category::Short => (-value).arg(),
            _ => value.arg(),
        }
    }

    /// Keyed measurements of this category.
    ///
    /// One-port keys are `P<port>`, through keys `P<pair>_S<ij>`.
    pub fn measurements<'a>(&self, set: &'a StandardSet) -> Result<Vec<(String, Cow<'a, Trace>)>> {
        let one_port = |kind: StandardKind| {
            set.one_port(kind)
                .map(|(port, t)| (format!("P{}", port), Cow::Borrowed(t)))
                .collect::<Vec<_>>()
        };
        let out = match self {
            Category::Open => one_port(StandardKind::Open),
            Category::Short => one_port(StandardKind::Short),
            Category::Load => one_port(StandardKind::Load),
            Category::ThruReflection => set
                .throughs()
                .iter()
                .flat_map(|(pair, t)| {
                    [
                        (format!("P{}_S11", pair), Cow::Borrowed(&t.s11)),
                        (format!("P{}_S22", pair), Cow::Borrowed(&t.s22)),
                    ]
                })
                .collect(),
            Category::ThruTransmission => set
                .throughs()
                .iter()
                .flat_map(|(pair, t)| {
                    [
                        (format!("P{}_S21", pair), Cow::Borrowed(&t.s21)),
                        (format!("P{}_S12", pair), Cow::Borrowed(&t.s12)),
                    ]
                })
                .collect(),
            Category::OpenShortPhase => {
                let mut out = vec![];
                for (port, open) in set.opens() {
                    let Some(short) = set.shorts().get(port) else {
                        continue;
                    };
                    let key = format!("P{}", port);
                    let ratio = open.ratio(short, &key)?;
                    out.push((key, Cow::Owned(ratio)));
                }
                out
            }
        };
        Ok(out)
    }
}

impl FromStr for Category {
    type Err = SimpleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(Category::Open),
            "SHORT" => Ok(Category::Short),
            "LOAD" => Ok(Category::Load),
            "THRU REFLECTION" => Ok(Category::ThruReflection),
            "THRU TRANSMISSION" => Ok(Category::ThruTransmission),
            "OPEN SHORT PHASE" => Ok(Category::OpenShortPhase),
            _ => bail!("unknown limit category"),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// One limit record as found in a limit file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
    #[serde(rename = "type")]
    pub limit_type: String,
    #[serde(rename = "limit", alias = "bound")]
    pub bound: String,
    /// Key prefixes the limit is restricted to, e.g. `["P12", "P34"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicable_to: Option<Vec<String>>,
}

impl Limit {
    fn parsed(&self, category: Category) -> Result<(LimitType, Bound)> {
        let limit_type = LimitType::from_str(&self.limit_type).map_err(|_| CalError::InvalidLimit {
            category: category.to_string(),
            msg: format!("unknown type '{}'", self.limit_type),
        })?;
        let bound = Bound::from_str(&self.bound).map_err(|_| CalError::InvalidLimit {
            category: category.to_string(),
            msg: format!("unknown limit '{}'", self.bound),
        })?;
        Ok((limit_type, bound))
    }

    pub fn applies_to(&self, key: &str) -> bool {
        match &self.applicable_to {
            None => true,
            Some(prefixes) => prefixes.iter().any(|p| key.starts_with(p.as_str())),
        }
    }

    fn in_range(&self, freq: f64) -> bool {
        freq >= self.x1.min(self.x2) && freq <= self.x1.max(self.x2)
    }

    /// Check one trace, returns the number of samples compared. Violations
    /// are pushed to `violations`; with `fail_fast` the first one ends the
    /// check.
    fn check(
        &self,
        category: Category,
        key: &str,
        trace: &Trace,
        (limit_type, bound): (LimitType, Bound),
        fail_fast: bool,
        violations: &mut Vec<Violation>,
    ) -> usize {
        let mut unwrapper = PhaseUnwrapper::new();
        let mut checks = 0;
        for sample in trace.iter().filter(|s| self.in_range(s.freq)) {
            let limval = interpolate(self.x1, self.x2, self.y1, self.y2, sample.freq);
            let yval = match limit_type {
                LimitType::Db => db(sample.value),
                LimitType::Phase => deg_0_360(sample.value),
                LimitType::Delay => {
                    let phase = unwrapper.push(category.phase(sample.value));
                    delay(phase, sample.freq)
                }
            };
            checks += 1;
            if bound.violated(yval, limval) {
                violations.push(Violation {
                    limit_type,
                    category,
                    key: key.to_string(),
                    freq: sample.freq,
                    limit: limval,
                    measured: yval,
                });
                if fail_fast {
                    break;
                }
            }
        }
        checks
    }
}

/// One sample outside its limit
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub limit_type: LimitType,
    pub category: Category,
    pub key: String,
    pub freq: f64,
    pub limit: f64,
    pub measured: f64,
}

impl From<Violation> for CalError {
    fn from(v: Violation) -> Self {
        CalError::LimitViolation {
            limit_type: v.limit_type.to_string(),
            category: v.category.to_string(),
            key: v.key,
            freq: v.freq,
            limit: v.limit,
            measured: v.measured,
        }
    }
}

/// Limit groups keyed by category name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitFile(pub BTreeMap<String, Vec<Limit>>);

impl LimitFile {
    pub fn from_json(json: &str) -> Result<LimitFile> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<LimitFile> {
        LimitFile::from_json(&fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, category: &str, limit: Limit) {
        self.0.entry(category.to_string()).or_default().push(limit);
    }

    /// Known categories with their limits, in file order of category name
    fn known(&self) -> (Vec<(Category, &Vec<Limit>)>, Vec<String>) {
        let mut known = vec![];
        let mut unknown = vec![];
        for (name, limits) in self.0.iter() {
            match Category::from_str(name) {
                Ok(category) => known.push((category, limits)),
                Err(_) => unknown.push(name.clone()),
            }
        }
        (known, unknown)
    }

    /// Static check of every limit in a known category, needs no
    /// measurements. Run before measuring to fail early.
    pub fn check(&self) -> Result<()> {
        for (category, limits) in self.known().0 {
            for limit in limits {
                limit.parsed(category)?;
            }
        }
        Ok(())
    }
}

/// Summary of a validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    /// Samples compared, per category
    pub checks: BTreeMap<String, usize>,
    /// Category names that were not recognised
    pub skipped: Vec<String>,
    /// Every violation found, in check order. Empty after [`validate`].
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn total_checks(&self) -> usize {
        self.checks.values().sum()
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check every limit of `limits` against the matching measurements of `set`,
/// failing on the first violation
pub fn validate(set: &StandardSet, limits: &LimitFile) -> Result<ValidationReport> {
    let mut report = run_checks(set, limits, true)?;
    match report.violations.pop() {
        Some(violation) => Err(violation.into()),
        None => Ok(report),
    }
}

/// Like [`validate`] but collects every violation into the report instead
/// of stopping. Malformed limits and misaligned traces are still errors.
pub fn validate_all(set: &StandardSet, limits: &LimitFile) -> Result<ValidationReport> {
    let report = run_checks(set, limits, false)?;
    if !report.passed() {
        warn!("{} limit violations", report.violations.len());
    }
    Ok(report)
}

fn run_checks(set: &StandardSet, limits: &LimitFile, fail_fast: bool) -> Result<ValidationReport> {
    let (known, skipped) = limits.known();
    for name in skipped.iter() {
        warn!("Skipping unknown limit category '{}'", name);
    }
    let mut report = ValidationReport {
        checks: BTreeMap::new(),
        skipped,
        violations: vec![],
    };

    for (category, group) in known {
        let parsed = group
            .iter()
            .map(|l| l.parsed(category).map(|p| (l, p)))
            .collect::<Result<Vec<_>>>()?;
        let measurements = category.measurements(set)?;
        if measurements.is_empty() {
            debug!("No measurements for limit category {}", category);
        }
        let mut checks = 0;
        for (limit, parsed) in parsed {
            for (key, trace) in measurements.iter().filter(|(k, _)| limit.applies_to(k)) {
                checks +=
                    limit.check(category, key, trace, parsed, fail_fast, &mut report.violations);
                if fail_fast && !report.violations.is_empty() {
                    return Ok(report);
                }
            }
        }
        *report.checks.entry(category.to_string()).or_default() += checks;
    }
    Ok(report)
}
