use crate::error::{CalError, Result};
use num::complex::Complex64;
use std::ops::{Deref, Index};

/// One frequency point of a swept measurement. Frequency is in Hz.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub freq: f64,
    pub value: Complex64,
}

impl Sample {
    pub fn new(freq: f64, value: Complex64) -> Sample {
        Sample { freq, value }
    }
}

/// Ordered frequency-swept trace of complex values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace(Vec<Sample>);

impl Trace {
    pub fn new(samples: Vec<Sample>) -> Trace {
        Trace(samples)
    }

    pub fn from_parts(freqs: &[f64], values: &[Complex64]) -> Trace {
        Trace(
            freqs
                .iter()
                .zip(values.iter())
                .map(|(&f, &v)| Sample::new(f, v))
                .collect(),
        )
    }

    pub fn samples(&self) -> &[Sample] {
        &self.0
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.0
    }

    pub fn freqs(&self) -> Vec<f64> {
        self.0.iter().map(|s| s.freq).collect()
    }

    pub fn values(&self) -> Vec<Complex64> {
        self.0.iter().map(|s| s.value).collect()
    }

    pub fn push(&mut self, sample: Sample) {
        self.0.push(sample);
    }

    /// First `n` samples (or all of them when shorter)
    pub fn truncated(&self, n: usize) -> Trace {
        Trace(self.0.iter().take(n).copied().collect())
    }

    /// Sample-by-sample `self / other` over the common length.
    ///
    /// Both traces must share the same frequency at every aligned index.
    pub fn ratio(&self, other: &Trace, key: &str) -> Result<Trace> {
        let n = self.len().min(other.len());
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let (a, b) = (self.0[i], other.0[i]);
            if a.freq != b.freq {
                return Err(CalError::FrequencyMismatch {
                    key: key.to_string(),
                    index: i,
                    left: a.freq,
                    right: b.freq,
                });
            }
            out.push(Sample::new(a.freq, a.value / b.value));
        }
        Ok(Trace(out))
    }
}

impl Deref for Trace {
    type Target = [Sample];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Index<usize> for Trace {
    type Output = Sample;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

impl From<Vec<Sample>> for Trace {
    fn from(samples: Vec<Sample>) -> Self {
        Trace(samples)
    }
}

impl FromIterator<Sample> for Trace {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Trace(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use num::complex::c64;

    #[test]
    fn test_trace_macro() {
        let t = crate::trace![(1e9, 0.1, 0.2), (2e9, 0.3, -0.4)];
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].freq, 2e9);
        assert_eq!(t[1].value, c64(0.3, -0.4));
    }

    #[test]
    fn test_truncated() {
        let t = crate::trace![(1.0, 1.0, 0.0), (2.0, 2.0, 0.0), (3.0, 3.0, 0.0)];
        assert_eq!(t.truncated(2).len(), 2);
        assert_eq!(t.truncated(5).len(), 3);
        assert_eq!(t.truncated(2).freqs(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_ratio() {
        let open = crate::trace![(1.0, 1.0, 0.0), (2.0, 0.0, 1.0), (3.0, 1.0, 1.0)];
        let short = crate::trace![(1.0, -1.0, 0.0), (2.0, 0.0, -1.0)];
        let r = open.ratio(&short, "P1").unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].value, c64(-1.0, 0.0));
        assert_eq!(r[1].value, c64(-1.0, 0.0));
    }

    #[test]
    fn test_ratio_frequency_mismatch() {
        let open = crate::trace![(1.0, 1.0, 0.0), (2.0, 0.0, 1.0)];
        let short = crate::trace![(1.0, -1.0, 0.0), (2.5, 0.0, -1.0)];
        match open.ratio(&short, "P3") {
            Err(CalError::FrequencyMismatch { key, index, .. }) => {
                assert_eq!(key, "P3");
                assert_eq!(index, 1);
            }
            other => panic!("expected frequency mismatch, got {:?}", other),
        }
    }
}
