use crate::error::{CalError, Result};
use crate::parameter::{DataFormat, SParam};
use crate::scale::Scale;
use crate::standard::{coefficient_name, PortPair, StandardKind, StandardSet, ThroughSet};
use crate::sweep::Sweep;
use crate::trace::{Sample, Trace};
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Option line of every file written
pub const OPTION_LINE: &str = "# GHz S RI R 50.0";

fn re_file_opts() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^#\s+(?<freq>\w?)hz\s+(?<param>g|h|s|y|z)\s+(?<format>db|ma|ri)\s+R\s+(?<impedance>\d+\.?\d*)")
            .expect("Invalid regex!")
    })
}

fn re_file_ext() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^s(?<ports>\d+)p$").expect("Invalid regex!"))
}

fn write_header<W: Write>(w: &mut W, comments: &[String]) -> Result<()> {
    for c in comments {
        writeln!(w, "! {}", c)?;
    }
    writeln!(w, "{}", OPTION_LINE)?;
    Ok(())
}

/// One-port file: `freq_GHz re im` per sample
pub fn write_s1p<W: Write>(w: &mut W, trace: &Trace, comments: &[String]) -> Result<()> {
    write_header(w, comments)?;
    for s in trace.iter() {
        writeln!(
            w,
            "{} {} {}",
            Scale::Giga.scale(s.freq),
            s.value.re,
            s.value.im
        )?;
    }
    Ok(())
}

/// Two-port file in `S11 S21 S12 S22` column order, truncated to the
/// shortest of the four traces
pub fn write_s2p<W: Write>(w: &mut W, through: &ThroughSet, comments: &[String]) -> Result<()> {
    write_header(w, comments)?;
    for i in 0..through.min_len() {
        write!(w, "{}", Scale::Giga.scale(through.s11[i].freq))?;
        for t in [&through.s11, &through.s21, &through.s12, &through.s22] {
            write!(w, " {} {}", t[i].value.re, t[i].value.im)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    debug!("Writing {}", path.display());
    Ok(BufWriter::new(File::create(path)?))
}

/// Write every standard of `set` into `dir`, one `P1_OPEN.s1p` style file per
/// one-port standard and one `P12_THROUGH.s2p` per pair. Returns the paths
/// written.
pub fn write_dir(set: &StandardSet, dir: &Path, comments: &[String]) -> Result<Vec<PathBuf>> {
    let mut written = vec![];
    for kind in StandardKind::ONE_PORT {
        for (port, trace) in set.one_port(kind) {
            let path = dir.join(format!("{}.s1p", coefficient_name(kind, &port.to_string())));
            let mut w = create(&path)?;
            write_s1p(&mut w, trace, comments)?;
            w.flush()?;
            written.push(path);
        }
    }
    for (pair, through) in set.throughs() {
        let name = coefficient_name(StandardKind::Through, &pair.to_string());
        let path = dir.join(format!("{}.s2p", name));
        let mut w = create(&path)?;
        write_s2p(&mut w, through, comments)?;
        w.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Parsed content of a one- or two-port Touchstone file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Touchstone {
    pub ports: usize,
    pub comments: Vec<String>,
    pub impedance: f64,
    pub sweep: Sweep,
}

impl Touchstone {
    pub fn trace(&self, to: usize, from: usize) -> Result<&Trace> {
        self.sweep.trace(SParam::new(to, from))
    }
}

fn format_err(path: &Path, line: usize, msg: &str) -> CalError {
    CalError::Format(format!("{}:{}: {}", path.display(), line + 1, msg))
}

/// Parse a `.s1p` or `.s2p` file; frequencies are returned in Hz
pub fn read_touchstone<P: AsRef<Path>>(path: P) -> Result<Touchstone> {
    let path = path.as_ref();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let ports: usize = match re_file_ext().captures(ext) {
        Some(caps) => caps["ports"]
            .parse()
            .map_err(|_| format_err(path, 0, "invalid file extension"))?,
        None => return Err(format_err(path, 0, "invalid file extension")),
    };
    if !(1..=2).contains(&ports) {
        return Err(format_err(path, 0, "only 1- and 2-port files are supported"));
    }
    // order of the values on a data line
    let params: Vec<SParam> = match ports {
        1 => vec![SParam::new(1, 1)],
        _ => vec![
            SParam::new(1, 1),
            SParam::new(2, 1),
            SParam::new(1, 2),
            SParam::new(2, 2),
        ],
    };

    let content = fs::read_to_string(path)?;
    let mut out = Touchstone {
        ports,
        impedance: 50.0,
        ..Touchstone::default()
    };
    let mut traces: Vec<Trace> = vec![Trace::default(); params.len()];
    let mut freq_unit = Scale::Giga;
    let mut format = DataFormat::MA;
    let mut data_section = false;

    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('!') {
            if !data_section {
                out.comments.push(comment.trim().to_string());
            }
            continue;
        }
        if line.starts_with('#') {
            let Some(vals) = re_file_opts().captures(line) else {
                return Err(format_err(path, n, "option line not valid"));
            };
            if !vals["param"].eq_ignore_ascii_case("s") {
                return Err(format_err(path, n, "only S parameters are supported"));
            }
            freq_unit = Scale::from_str(&vals["freq"]).map_err(|e| format_err(path, n, e.as_str()))?;
            format = DataFormat::from_str(&vals["format"]).map_err(|e| format_err(path, n, e.as_str()))?;
            out.impedance = vals["impedance"]
                .parse()
                .map_err(|_| format_err(path, n, "invalid reference impedance"))?;
            continue;
        }

        data_section = true;
        let data = line.split('!').next().unwrap_or_default();
        let fields = data
            .split_whitespace()
            .map(f64::from_str)
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| format_err(path, n, "invalid number"))?;
        if fields.len() != 1 + 2 * params.len() {
            return Err(format_err(
                path,
                n,
                &format!("expected {} values, found {}", 1 + 2 * params.len(), fields.len()),
            ));
        }
        let freq = freq_unit.unscale(fields[0]);
        for (k, trace) in traces.iter_mut().enumerate() {
            let value = format.parse(fields[1 + 2 * k], fields[2 + 2 * k]);
            trace.push(Sample::new(freq, value));
        }
    }

    out.sweep = params.into_iter().zip(traces).collect();
    Ok(out)
}

fn read_required(path: PathBuf) -> Result<Touchstone> {
    if !path.exists() {
        return Err(CalError::MissingStandard(path.display().to_string()));
    }
    read_touchstone(path)
}

/// Rebuild a [`StandardSet`] for ports `1..=ports` from a directory written by
/// [`write_dir`]. Every expected file must be present.
pub fn read_dir(dir: &Path, ports: usize) -> Result<StandardSet> {
    let mut set = StandardSet::new();
    for port in 1..=ports {
        for kind in StandardKind::ONE_PORT {
            let name = coefficient_name(kind, &port.to_string());
            let ts = read_required(dir.join(format!("{}.s1p", name)))?;
            set.insert(kind, port, ts.trace(1, 1)?.clone());
        }
    }
    for pair in PortPair::all(ports) {
        let name = coefficient_name(StandardKind::Through, &pair.to_string());
        let ts = read_required(dir.join(format!("{}.s2p", name)))?;
        set.insert_through(
            pair,
            ThroughSet {
                s11: ts.trace(1, 1)?.clone(),
                s12: ts.trace(1, 2)?.clone(),
                s21: ts.trace(2, 1)?.clone(),
                s22: ts.trace(2, 2)?.clone(),
            },
        );
    }
    Ok(set)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trace;
    use float_cmp::{approx_eq, F64Margin};

    fn comp_trace(a: &Trace, b: &Trace) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(approx_eq!(f64, x.freq, y.freq, F64Margin::default()));
            assert!(approx_eq!(f64, x.value.re, y.value.re, F64Margin::default()));
            assert!(approx_eq!(f64, x.value.im, y.value.im, F64Margin::default()));
        }
    }

    #[test]
    fn s1p_layout() {
        let mut buf = vec![];
        write_s1p(
            &mut buf,
            &trace![(1.5e9, 0.25, -0.5)],
            &["Serial 1234".to_string()],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "! Serial 1234\n# GHz S RI R 50.0\n1.5 0.25 -0.5\n");
    }

    #[test]
    fn s2p_column_order() {
        let through = ThroughSet {
            s11: trace![(1e9, 11.0, 0.0)],
            s12: trace![(1e9, 12.0, 0.0)],
            s21: trace![(1e9, 21.0, 0.0)],
            s22: trace![(1e9, 22.0, 0.0), (2e9, 22.0, 0.0)],
        };
        let mut buf = vec![];
        write_s2p(&mut buf, &through, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "# GHz S RI R 50.0\n1 11 0 21 0 12 0 22 0\n");
    }

    #[test]
    fn round_trip_dir() {
        let mut set = StandardSet::new();
        for port in 1..=2 {
            let p = port as f64;
            set.insert(StandardKind::Open, port, trace![(3e4, 0.9, 0.1 * p), (6e9, 0.7, -0.3)]);
            set.insert(StandardKind::Short, port, trace![(3e4, -0.9, 0.01), (6e9, -0.123456789012345, 0.3)]);
            set.insert(StandardKind::Load, port, trace![(3e4, 1e-4, -2e-5), (6e9, 0.01, 0.002)]);
        }
        set.insert_through(
            PortPair::new(1, 2),
            ThroughSet {
                s11: trace![(3e4, 0.01, 0.0), (6e9, 0.02, 0.01)],
                s12: trace![(3e4, 0.99, -0.01), (6e9, -0.5, 0.6)],
                s21: trace![(3e4, 0.98, -0.02), (6e9, -0.4, 0.7)],
                s22: trace![(3e4, 0.03, 0.0), (6e9, 0.04, 0.02)],
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let files = write_dir(&set, dir.path(), &["calkit".to_string()]).unwrap();
        assert_eq!(files.len(), 7);
        assert!(dir.path().join("P12_THROUGH.s2p").exists());

        let back = read_dir(dir.path(), 2).unwrap();
        for kind in StandardKind::ONE_PORT {
            for port in 1..=2 {
                comp_trace(set.get(kind, port).unwrap(), back.get(kind, port).unwrap());
            }
        }
        let (a, b) = (
            set.get_through(PortPair::new(1, 2)).unwrap(),
            back.get_through(PortPair::new(1, 2)).unwrap(),
        );
        comp_trace(&a.s11, &b.s11);
        comp_trace(&a.s12, &b.s12);
        comp_trace(&a.s21, &b.s21);
        comp_trace(&a.s22, &b.s22);

        let ts = read_touchstone(dir.path().join("P1_OPEN.s1p")).unwrap();
        assert_eq!(ts.comments, vec!["calkit".to_string()]);
        assert_eq!(ts.impedance, 50.0);
    }

    #[test]
    fn read_ma_mhz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dut.s1p");
        fs::write(
            &path,
            "! Created with mwavepy.\n# MHz S MA R 50\n100 0.5 90\n200 0.5 -90 ! trailing\n",
        )
        .unwrap();
        let ts = read_touchstone(&path).unwrap();
        assert_eq!(ts.ports, 1);
        assert_eq!(ts.comments, vec!["Created with mwavepy.".to_string()]);
        let t = ts.trace(1, 1).unwrap();
        assert_eq!(t.freqs(), vec![100e6, 200e6]);
        assert!(approx_eq!(f64, t[0].value.im, 0.5, epsilon = 1e-12));
        assert!(approx_eq!(f64, t[1].value.re, 0.0, epsilon = 1e-12));
    }

    #[test]
    fn malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let bad_opts = dir.path().join("a.s1p");
        fs::write(&bad_opts, "# GHz\n1 0 0\n").unwrap();
        assert!(matches!(read_touchstone(&bad_opts), Err(CalError::Format(_))));

        let short_line = dir.path().join("b.s2p");
        fs::write(&short_line, "# GHz S RI R 50\n1 0 0 0 0\n").unwrap();
        assert!(matches!(read_touchstone(&short_line), Err(CalError::Format(_))));

        let four_port = dir.path().join("c.s4p");
        fs::write(&four_port, "# GHz S RI R 50\n").unwrap();
        assert!(matches!(read_touchstone(&four_port), Err(CalError::Format(_))));
    }

    #[test]
    fn missing_file_is_missing_standard() {
        let dir = tempfile::tempdir().unwrap();
        match read_dir(dir.path(), 2) {
            Err(CalError::MissingStandard(path)) => assert!(path.ends_with("P1_OPEN.s1p")),
            other => panic!("expected missing standard, got {:?}", other),
        }
    }
}
