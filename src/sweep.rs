use crate::error::{CalError, Result};
use crate::parameter::SParam;
use crate::trace::Trace;
use std::collections::BTreeMap;

/// Result of one instrument sweep: every returned S-parameter label mapped
/// to its trace. Labels are in instrument-channel space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sweep {
    traces: BTreeMap<SParam, Trace>,
}

impl Sweep {
    pub fn new() -> Sweep {
        Sweep {
            traces: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, param: SParam, trace: Trace) {
        self.traces.insert(param, trace);
    }

    pub fn get(&self, param: SParam) -> Option<&Trace> {
        self.traces.get(&param)
    }

    /// Like `get`, but a missing label is an instrument data error
    pub fn trace(&self, param: SParam) -> Result<&Trace> {
        self.traces
            .get(&param)
            .ok_or_else(|| CalError::MissingParameter(param.to_string()))
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn params(&self) -> impl Iterator<Item = &SParam> {
        self.traces.keys()
    }

    /// Check that every `Sij` for `i, j` in `[1, channels]` is present and
    /// that all of them have the same number of points.
    pub fn sanity_check(&self, channels: usize) -> Result<()> {
        let mut points: Option<usize> = None;
        for param in SParam::all(channels) {
            let trace = self.trace(param)?;
            match points {
                None => points = Some(trace.len()),
                Some(n) if n != trace.len() => {
                    return Err(CalError::InconsistentSweep {
                        expected: n,
                        found: trace.len(),
                        param: param.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<(SParam, Trace)> for Sweep {
    fn from_iter<I: IntoIterator<Item = (SParam, Trace)>>(iter: I) -> Self {
        Sweep {
            traces: iter.into_iter().collect(),
        }
    }
}
