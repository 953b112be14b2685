use crate::trace::Trace;
use core::fmt;
use simple_error::{bail, SimpleError};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Kind of calibration standard
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardKind {
    Open,
    Short,
    Load,
    Through,
}

impl StandardKind {
    pub const ONE_PORT: [StandardKind; 3] =
        [StandardKind::Open, StandardKind::Short, StandardKind::Load];

    pub fn to_str(&self) -> &str {
        match self {
            StandardKind::Open => "OPEN",
            StandardKind::Short => "SHORT",
            StandardKind::Load => "LOAD",
            StandardKind::Through => "THROUGH",
        }
    }

    pub fn is_one_port(&self) -> bool {
        !matches!(self, StandardKind::Through)
    }
}

impl FromStr for StandardKind {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(StandardKind::Open),
            "SHORT" => Ok(StandardKind::Short),
            "LOAD" => Ok(StandardKind::Load),
            "THROUGH" | "THRU" => Ok(StandardKind::Through),
            _ => bail!("string not a valid standard kind"),
        }
    }
}

impl fmt::Display for StandardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Unordered pair of device ports, stored with `first < second`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortPair {
    first: usize,
    second: usize,
}

impl PortPair {
    pub fn new(a: usize, b: usize) -> PortPair {
        if a <= b {
            PortPair { first: a, second: b }
        } else {
            PortPair { first: b, second: a }
        }
    }

    /// Pair-local port 1
    pub fn first(&self) -> usize {
        self.first
    }

    /// Pair-local port 2
    pub fn second(&self) -> usize {
        self.second
    }

    /// All unordered pairs over ports `1..=ports`, lexicographic
    pub fn all(ports: usize) -> Vec<PortPair> {
        let mut out = vec![];
        for a in 1..=ports {
            for b in (a + 1)..=ports {
                out.push(PortPair::new(a, b));
            }
        }
        out
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.first, self.second)
    }
}

/// Four traces of one THROUGH measurement in pair-local indexing
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThroughSet {
    pub s11: Trace,
    pub s12: Trace,
    pub s21: Trace,
    pub s22: Trace,
}

impl ThroughSet {
    pub fn min_len(&self) -> usize {
        [&self.s11, &self.s12, &self.s21, &self.s22]
            .iter()
            .map(|t| t.len())
            .min()
            .unwrap_or(0)
    }
}

/// Per-port and per-pair datasets of one calibration run.
///
/// A key is written at most once: later inserts for a key that is already
/// present are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StandardSet {
    opens: BTreeMap<usize, Trace>,
    shorts: BTreeMap<usize, Trace>,
    loads: BTreeMap<usize, Trace>,
    throughs: BTreeMap<PortPair, ThroughSet>,
}

impl StandardSet {
    pub fn new() -> StandardSet {
        StandardSet::default()
    }

    fn one_port_map(&self, kind: StandardKind) -> Option<&BTreeMap<usize, Trace>> {
        match kind {
            StandardKind::Open => Some(&self.opens),
            StandardKind::Short => Some(&self.shorts),
            StandardKind::Load => Some(&self.loads),
            StandardKind::Through => None,
        }
    }

    pub fn opens(&self) -> &BTreeMap<usize, Trace> {
        &self.opens
    }

    pub fn shorts(&self) -> &BTreeMap<usize, Trace> {
        &self.shorts
    }

    pub fn loads(&self) -> &BTreeMap<usize, Trace> {
        &self.loads
    }

    pub fn throughs(&self) -> &BTreeMap<PortPair, ThroughSet> {
        &self.throughs
    }

    /// One-port entries of `kind`; empty for THROUGH
    pub fn one_port(&self, kind: StandardKind) -> impl Iterator<Item = (&usize, &Trace)> {
        self.one_port_map(kind).into_iter().flat_map(|m| m.iter())
    }

    pub fn get(&self, kind: StandardKind, port: usize) -> Option<&Trace> {
        self.one_port_map(kind).and_then(|m| m.get(&port))
    }

    pub fn get_through(&self, pair: PortPair) -> Option<&ThroughSet> {
        self.throughs.get(&pair)
    }

    pub fn contains(&self, kind: StandardKind, port: usize) -> bool {
        self.get(kind, port).is_some()
    }

    pub fn contains_through(&self, pair: PortPair) -> bool {
        self.throughs.contains_key(&pair)
    }

    /// Store a one-port trace. Returns `false` if the key was already present.
    pub fn insert(&mut self, kind: StandardKind, port: usize, trace: Trace) -> bool {
        let map = match kind {
            StandardKind::Open => &mut self.opens,
            StandardKind::Short => &mut self.shorts,
            StandardKind::Load => &mut self.loads,
            StandardKind::Through => return false,
        };
        if map.contains_key(&port) {
            return false;
        }
        map.insert(port, trace);
        true
    }

    /// Store a THROUGH. Returns `false` if the pair was already present.
    pub fn insert_through(&mut self, pair: PortPair, through: ThroughSet) -> bool {
        if self.throughs.contains_key(&pair) {
            return false;
        }
        self.throughs.insert(pair, through);
        true
    }

    /// Ports of `ports` lacking a `kind` entry
    pub fn missing(&self, kind: StandardKind, ports: &[usize]) -> Vec<usize> {
        ports
            .iter()
            .copied()
            .filter(|&p| !self.contains(kind, p))
            .collect()
    }

    /// Pairs over `ports` lacking a THROUGH entry
    pub fn missing_throughs(&self, ports: &[usize]) -> Vec<PortPair> {
        let mut out = vec![];
        for (i, &a) in ports.iter().enumerate() {
            for &b in ports.iter().skip(i + 1) {
                let pair = PortPair::new(a, b);
                if !self.contains_through(pair) && !out.contains(&pair) {
                    out.push(pair);
                }
            }
        }
        out.sort();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.opens.is_empty()
            && self.shorts.is_empty()
            && self.loads.is_empty()
            && self.throughs.is_empty()
    }

    /// Every trace held, with its coefficient name
    pub fn all_traces(&self) -> Vec<(String, &Trace)> {
        let mut out = vec![];
        for kind in StandardKind::ONE_PORT {
            for (port, trace) in self.one_port(kind) {
                out.push((coefficient_name(kind, &port.to_string()), trace));
            }
        }
        for (pair, t) in self.throughs.iter() {
            let name = coefficient_name(StandardKind::Through, &pair.to_string());
            for trace in [&t.s11, &t.s12, &t.s21, &t.s22] {
                out.push((name.clone(), trace));
            }
        }
        out
    }
}

/// `P<id>_<KIND>`, e.g. `P1_OPEN` or `P12_THROUGH`
pub fn coefficient_name(kind: StandardKind, id: &str) -> String {
    format!("P{}_{}", id, kind)
}
