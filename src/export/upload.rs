use crate::device::{CalUnit, MAX_COMMENTS};
use crate::error::{CalError, Result};
use crate::scale::Scale;
use crate::standard::{coefficient_name, StandardKind, StandardSet, ThroughSet};
use crate::trace::Trace;
use tracing::{debug, warn};

/// Coefficient class that needs the factory partition unlocked
pub const FACTORY_CLASS: &str = "FACTORY";

/// One named coefficient as sent to the unit, frequencies in GHz
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub points: Vec<Vec<f64>>,
}

impl Coefficient {
    /// `(freq, re, im)` per sample
    pub fn one_port(name: String, trace: &Trace) -> Coefficient {
        let points = trace
            .iter()
            .map(|s| vec![Scale::Giga.scale(s.freq), s.value.re, s.value.im])
            .collect();
        Coefficient { name, points }
    }

    /// `(freq, S11, S21, S12, S22)` per sample, each as re/im
    pub fn through(name: String, through: &ThroughSet) -> Coefficient {
        let points = (0..through.min_len())
            .map(|i| {
                let mut row = Vec::with_capacity(9);
                row.push(Scale::Giga.scale(through.s11[i].freq));
                for t in [&through.s11, &through.s21, &through.s12, &through.s22] {
                    row.push(t[i].value.re);
                    row.push(t[i].value.im);
                }
                row
            })
            .collect();
        Coefficient { name, points }
    }

    /// Every coefficient of `set`: one-port standards first, then throughs
    pub fn all(set: &StandardSet) -> Vec<Coefficient> {
        let mut out = vec![];
        for kind in StandardKind::ONE_PORT {
            for (port, trace) in set.one_port(kind) {
                out.push(Coefficient::one_port(
                    coefficient_name(kind, &port.to_string()),
                    trace,
                ));
            }
        }
        for (pair, through) in set.throughs() {
            out.push(Coefficient::through(
                coefficient_name(StandardKind::Through, &pair.to_string()),
                through,
            ));
        }
        out
    }
}

fn send_comments<U: CalUnit + ?Sized>(unit: &mut U, comments: &[String]) -> Result<()> {
    for (i, comment) in comments.iter().enumerate() {
        match unit.add_comment(comment) {
            Ok(()) => {}
            Err(CalError::DeviceRejected(cmd)) if i >= MAX_COMMENTS => {
                warn!(
                    "Unit keeps at most {} comments, dropped the rest ({})",
                    MAX_COMMENTS, cmd
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Store every coefficient of `set` on the unit under `class`, returns the
/// number of coefficients written.
///
/// Uploading to the factory class unlocks it and deletes what is there.
pub fn upload<U>(unit: &mut U, set: &StandardSet, class: &str, comments: &[String]) -> Result<usize>
where
    U: CalUnit + ?Sized,
{
    if class == FACTORY_CLASS {
        unit.enable_factory_write()?;
        unit.clear_factory()?;
    }
    let coefficients = Coefficient::all(set);
    for coeff in coefficients.iter() {
        debug!("Uploading {} ({} points)", coeff.name, coeff.points.len());
        unit.create_coefficient(class, &coeff.name)?;
        send_comments(unit, comments)?;
        for point in coeff.points.iter() {
            unit.add_point(point)?;
        }
        unit.finish_coefficient()?;
    }
    Ok(coefficients.len())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::SimulatedUnit;
    use crate::standard::PortPair;
    use crate::trace;

    fn set() -> StandardSet {
        let mut set = StandardSet::new();
        set.insert(StandardKind::Open, 1, trace![(1e9, 0.9, 0.1), (2e9, 0.8, 0.2)]);
        set.insert(StandardKind::Short, 1, trace![(1e9, -0.9, 0.1), (2e9, -0.8, 0.2)]);
        set.insert_through(
            PortPair::new(1, 2),
            ThroughSet {
                s11: trace![(5e8, 1.1, 1.2)],
                s12: trace![(5e8, 3.1, 3.2)],
                s21: trace![(5e8, 2.1, 2.2)],
                s22: trace![(5e8, 4.1, 4.2)],
            },
        );
        set
    }

    #[test]
    fn records() {
        let all = Coefficient::all(&set());
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["P1_OPEN", "P1_SHORT", "P12_THROUGH"]);
        assert_eq!(all[0].points[1], vec![2.0, 0.8, 0.2]);
        assert_eq!(
            all[2].points[0],
            vec![0.5, 1.1, 1.2, 2.1, 2.2, 3.1, 3.2, 4.1, 4.2]
        );
    }

    #[test]
    fn upload_to_factory() {
        let mut unit = SimulatedUnit::new(2);
        let n = upload(&mut unit, &set(), FACTORY_CLASS, &["calkit".to_string()]).unwrap();
        assert_eq!(n, 3);
        let stored = unit.coefficient(FACTORY_CLASS, "P12_THROUGH").unwrap();
        assert_eq!(stored.comments, vec!["calkit".to_string()]);
        assert_eq!(stored.points.len(), 1);
        assert_eq!(stored.points[0].len(), 9);
    }

    #[test]
    fn comments_beyond_cap_are_tolerated() {
        let mut unit = SimulatedUnit::new(2);
        let comments: Vec<String> = (0..MAX_COMMENTS + 5).map(|i| format!("c{}", i)).collect();
        upload(&mut unit, &set(), "USER", &comments).unwrap();
        let stored = unit.coefficient("USER", "P1_OPEN").unwrap();
        assert_eq!(stored.comments.len(), MAX_COMMENTS);
        assert_eq!(stored.points.len(), 2);
    }

    #[test]
    fn rejection_below_cap_is_fatal() {
        // factory class without unlock fails on CREATE
        let mut unit = SimulatedUnit::new(2);
        assert!(unit.create_coefficient(FACTORY_CLASS, "X").is_err());
        // a unit that is mid-coefficient rejects the next CREATE
        unit.create_coefficient("USER", "open").unwrap();
        assert!(matches!(
            upload(&mut unit, &set(), "USER", &[]),
            Err(CalError::DeviceRejected(_))
        ));
    }
}
