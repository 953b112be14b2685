//! Connection planning
//!
//! A calibration unit may have more ports than the instrument can address at
//! once. The planner produces the ordered list of wiring configurations
//! ([`ConnectionStep`]) that together expose every device port to the
//! instrument and every unordered pair of device ports together in the same
//! step.
//!
//! Only 2 to 4 ports are supported on either side, so the plans are static
//! tables rather than a search.

use crate::error::{CalError, Result};
use crate::standard::PortPair;
use core::fmt;

/// Highest number of instrument channels used, extra channels are ignored
pub const MAX_INSTRUMENT_PORTS: usize = 4;

/// Highest number of device ports supported
pub const MAX_DEVICE_PORTS: usize = 4;

// [instrument channel, device port]
const PLAN_4_BY_2: [[[usize; 2]; 2]; 6] = [
    [[1, 1], [2, 2]],
    [[1, 3], [2, 4]],
    [[1, 2], [2, 3]],
    [[1, 4], [2, 1]],
    [[1, 1], [2, 3]],
    [[1, 2], [2, 4]],
];

// port 1 stays on channel 1; only wiring and pair coverage matter here
const PLAN_4_BY_3: [[[usize; 2]; 3]; 3] = [
    [[1, 1], [2, 2], [3, 3]],
    [[1, 1], [2, 2], [3, 4]],
    [[1, 1], [2, 3], [3, 4]],
];

const PLAN_3_BY_2: [[[usize; 2]; 2]; 3] = [
    [[1, 1], [2, 2]],
    [[1, 2], [2, 3]],
    [[1, 3], [2, 1]],
];

/// One physical wiring configuration: instrument channel -> device port
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionStep {
    // (instrument channel, device port), ordered by channel
    links: Vec<(usize, usize)>,
}

impl ConnectionStep {
    /// Build a step from `(instrument_channel, device_port)` pairs.
    ///
    /// Channels must be dense from 1 and both sides must be unique.
    pub fn new(links: &[(usize, usize)]) -> Result<ConnectionStep> {
        let mut links = links.to_vec();
        links.sort();
        for (i, &(channel, port)) in links.iter().enumerate() {
            if channel != i + 1 {
                return Err(CalError::InvalidConfig(format!(
                    "instrument channels must be dense from 1, found channel {}",
                    channel
                )));
            }
            if port == 0 || links.iter().filter(|l| l.1 == port).count() > 1 {
                return Err(CalError::InvalidConfig(format!(
                    "device port {} is not valid or mapped twice",
                    port
                )));
            }
        }
        Ok(ConnectionStep { links })
    }

    fn from_table(rows: &[[usize; 2]]) -> ConnectionStep {
        ConnectionStep {
            links: rows.iter().map(|r| (r[0], r[1])).collect(),
        }
    }

    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    /// Number of instrument channels in use
    pub fn channels(&self) -> usize {
        self.links.len()
    }

    /// Device ports in channel order
    pub fn ports(&self) -> Vec<usize> {
        self.links.iter().map(|l| l.1).collect()
    }

    /// Instrument channel a device port is wired to
    pub fn channel_of(&self, port: usize) -> Option<usize> {
        self.links.iter().find(|l| l.1 == port).map(|l| l.0)
    }

    /// Device port wired to an instrument channel
    pub fn port_at(&self, channel: usize) -> Option<usize> {
        self.links.iter().find(|l| l.0 == channel).map(|l| l.1)
    }

    /// Unordered device-port pairs present in this step
    pub fn pairs(&self) -> Vec<PortPair> {
        let ports = self.ports();
        let mut out = vec![];
        for (i, &a) in ports.iter().enumerate() {
            for &b in ports.iter().skip(i + 1) {
                out.push(PortPair::new(a, b));
            }
        }
        out.sort();
        out
    }
}

impl fmt::Display for ConnectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .links
            .iter()
            .map(|(c, p)| format!("{} -> {}", c, p))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Clamp the instrument channel count reported by a sweep source
pub fn usable_instrument_ports(reported: usize) -> Result<usize> {
    if reported < 2 {
        return Err(CalError::InsufficientPorts(reported));
    }
    Ok(reported.min(MAX_INSTRUMENT_PORTS))
}

/// Ordered connection steps for `device_ports` device ports using
/// `instrument_ports` simultaneously addressable instrument channels.
pub fn plan(device_ports: usize, instrument_ports: usize) -> Result<Vec<ConnectionStep>> {
    if instrument_ports < 2 {
        return Err(CalError::InsufficientPorts(instrument_ports));
    }
    if !(2..=MAX_DEVICE_PORTS).contains(&device_ports) {
        return Err(CalError::InvalidConfig(format!(
            "{} device ports requested, 2 to {} supported",
            device_ports, MAX_DEVICE_PORTS
        )));
    }
    let channels = instrument_ports.min(MAX_INSTRUMENT_PORTS);

    if channels >= device_ports {
        let links: Vec<[usize; 2]> = (1..=device_ports).map(|p| [p, p]).collect();
        return Ok(vec![ConnectionStep::from_table(&links)]);
    }

    let steps = match (device_ports, channels) {
        (4, 2) => PLAN_4_BY_2.iter().map(|s| ConnectionStep::from_table(s)).collect(),
        (4, 3) => PLAN_4_BY_3.iter().map(|s| ConnectionStep::from_table(s)).collect(),
        (3, 2) => PLAN_3_BY_2.iter().map(|s| ConnectionStep::from_table(s)).collect(),
        _ => unreachable!("channels < device_ports <= 4 with channels >= 2"),
    };
    Ok(steps)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;

    fn check_coverage(device_ports: usize, steps: &[ConnectionStep]) {
        let ports: BTreeSet<usize> = steps.iter().flat_map(|s| s.ports()).collect();
        assert_eq!(ports, (1..=device_ports).collect::<BTreeSet<usize>>());

        let pairs: BTreeSet<PortPair> = steps.iter().flat_map(|s| s.pairs()).collect();
        assert_eq!(pairs, PortPair::all(device_ports).into_iter().collect());

        for step in steps {
            for (i, (c, _)) in step.links().iter().enumerate() {
                assert_eq!(*c, i + 1);
            }
        }
    }

    #[test]
    fn plan_covers_ports_and_pairs() {
        for n in 2..=4 {
            for m in 2..=6 {
                let steps = plan(n, m).unwrap();
                check_coverage(n, &steps);
            }
        }
    }

    #[test]
    fn plan_two_channels_four_ports() {
        let steps = plan(4, 2).unwrap();
        assert_eq!(steps.len(), 6);
        // channel 1 visits every device port
        let first: BTreeSet<usize> = steps.iter().filter_map(|s| s.port_at(1)).collect();
        assert_eq!(first, [1, 2, 3, 4].into_iter().collect());
    }

    #[test]
    fn plan_three_channels_four_ports() {
        let steps = plan(4, 3).unwrap();
        check_coverage(4, &steps);
        // channel 1 is not required to move here
        assert!(steps.iter().all(|s| s.port_at(1) == Some(1)));
    }

    #[test]
    fn plan_step_counts() {
        assert_eq!(plan(4, 3).unwrap().len(), 3);
        assert_eq!(plan(4, 4).unwrap().len(), 1);
        assert_eq!(plan(4, 8).unwrap().len(), 1);
        assert_eq!(plan(3, 2).unwrap().len(), 3);
        assert_eq!(plan(2, 2).unwrap().len(), 1);
    }

    #[test]
    fn plan_rejects_bad_counts() {
        assert!(matches!(plan(4, 1), Err(CalError::InsufficientPorts(1))));
        assert!(matches!(plan(5, 2), Err(CalError::InvalidConfig(_))));
        assert!(matches!(usable_instrument_ports(0), Err(CalError::InsufficientPorts(0))));
        assert_eq!(usable_instrument_ports(6).unwrap(), 4);
        assert_eq!(usable_instrument_ports(3).unwrap(), 3);
    }

    #[test]
    fn step_lookup() {
        let step = ConnectionStep::new(&[(2, 3), (1, 4)]).unwrap();
        assert_eq!(step.ports(), vec![4, 3]);
        assert_eq!(step.channel_of(3), Some(2));
        assert_eq!(step.port_at(1), Some(4));
        assert_eq!(step.pairs(), vec![PortPair::new(3, 4)]);
        assert_eq!(step.to_string(), "1 -> 4, 2 -> 3");
    }

    #[test]
    fn step_validation() {
        assert!(ConnectionStep::new(&[(1, 1), (3, 2)]).is_err());
        assert!(ConnectionStep::new(&[(1, 1), (2, 1)]).is_err());
        assert!(ConnectionStep::new(&[(1, 0)]).is_err());
    }
}
