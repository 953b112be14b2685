//! Vendor calibration-module bundle
//!
//! The bundle is a zip archive holding one combined CSV of every standard,
//! plus a fixed 1024 byte header record describing the archive. All traces
//! are cut to the shortest common length since the CSV is one table.

use crate::config::VendorConfig;
use crate::error::{CalError, Result};
use crate::standard::{coefficient_name, PortPair, StandardKind, StandardSet};
use crate::trace::Trace;
use chrono::Utc;
use md5::{Digest, Md5};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const HEADER_LEN: usize = 1024;
pub const CSV_NAME: &str = "Factory.csv";
pub const ARCHIVE_FILE: &str = "data0.zip";
pub const HEADER_FILE: &str = "info.dat";

const PORT_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// `%.18e` with a signed, at least two digit exponent
fn sci(v: f64) -> String {
    let s = format!("{:.18e}", v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

fn port_letter(port: usize) -> char {
    PORT_LETTERS[port - 1]
}

fn pair_label(pair: &PortPair) -> String {
    format!("{}{}", port_letter(pair.first()), port_letter(pair.second()))
}

/// Table columns in output order, after the frequency column
struct Columns<'a> {
    ports: usize,
    one_port: Vec<[&'a Trace; 3]>,
    throughs: Vec<(PortPair, [&'a Trace; 4])>,
}

impl<'a> Columns<'a> {
    fn collect(set: &'a StandardSet) -> Result<Columns<'a>> {
        let ports = StandardKind::ONE_PORT
            .iter()
            .filter_map(|&kind| set.one_port(kind).map(|(p, _)| *p).max())
            .max()
            .ok_or_else(|| CalError::MissingStandard(coefficient_name(StandardKind::Open, "1")))?;
        if ports > PORT_LETTERS.len() {
            return Err(CalError::InvalidConfig(format!(
                "vendor bundle holds at most {} ports, got {}",
                PORT_LETTERS.len(),
                ports
            )));
        }

        let lookup = |kind: StandardKind, port: usize| {
            set.get(kind, port)
                .ok_or_else(|| CalError::MissingStandard(coefficient_name(kind, &port.to_string())))
        };
        let mut one_port = Vec::with_capacity(ports);
        for port in 1..=ports {
            one_port.push([
                lookup(StandardKind::Open, port)?,
                lookup(StandardKind::Short, port)?,
                lookup(StandardKind::Load, port)?,
            ]);
        }

        let mut throughs = vec![];
        for pair in PortPair::all(ports) {
            let t = set.get_through(pair).ok_or_else(|| {
                CalError::MissingStandard(coefficient_name(StandardKind::Through, &pair.to_string()))
            })?;
            throughs.push((pair, [&t.s11, &t.s21, &t.s12, &t.s22]));
        }

        Ok(Columns {
            ports,
            one_port,
            throughs,
        })
    }

    fn traces(&self) -> impl Iterator<Item = &'a Trace> + '_ {
        self.one_port
            .iter()
            .flat_map(|c| c.iter())
            .chain(self.throughs.iter().flat_map(|(_, c)| c.iter()))
            .copied()
    }

    /// Shortest length across every included trace
    fn rows(&self) -> usize {
        self.traces().map(|t| t.len()).min().unwrap_or(0)
    }

    fn header(&self, confidence: bool) -> String {
        let mut names = vec![String::from("#HZ")];
        names.extend((1..=self.ports).map(|p| port_letter(p).to_string()));
        names.extend(self.throughs.iter().map(|(pair, _)| format!("T_{}", pair_label(pair))));
        if confidence {
            names.extend(self.throughs.iter().map(|(pair, _)| format!("CF_{}", pair_label(pair))));
        }
        names.join(",")
    }
}

/// Render the combined CSV of `set`
pub fn render_csv(set: &StandardSet, config: &VendorConfig) -> Result<(String, FrequencyAxis)> {
    let columns = Columns::collect(set)?;
    let rows = columns.rows();
    if rows == 0 {
        return Err(CalError::Format("vendor bundle needs at least one sample".to_string()));
    }
    let axis_source = columns.one_port[0][0];
    if columns.traces().any(|t| t.len() != rows) {
        info!("Truncating all traces to {} samples", rows);
    }
    if columns
        .traces()
        .any(|t| t.iter().take(rows).zip(axis_source.iter()).any(|(a, b)| a.freq != b.freq))
    {
        warn!("Frequency axes differ between standards, using the axis of P1_OPEN");
    }

    let mut out = String::new();
    for line in config.info_lines.iter() {
        out.push_str(&format!("! {}\n", line));
    }
    out.push_str(&columns.header(config.confidence_block));
    out.push('\n');

    let mut row: Vec<String> = vec![];
    for i in 0..rows {
        row.clear();
        row.push(sci(axis_source[i].freq));
        for traces in columns.one_port.iter() {
            for t in traces {
                row.push(sci(t[i].value.re));
                row.push(sci(t[i].value.im));
            }
            row.push(sci(0.0));
            row.push(sci(0.0));
        }
        let through_start = row.len();
        for (_, traces) in columns.throughs.iter() {
            for t in traces {
                row.push(sci(t[i].value.re));
                row.push(sci(t[i].value.im));
            }
        }
        if config.confidence_block {
            let confidence = row[through_start..].to_vec();
            row.extend(confidence);
        }
        out.push_str(&row.join(","));
        out.push('\n');
    }

    let axis = FrequencyAxis {
        start: axis_source[0].freq,
        stop: axis_source[rows - 1].freq,
        count: rows,
    };
    Ok((out, axis))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyAxis {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

fn fixed_field(s: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let bytes = s.as_bytes();
    let n = bytes.len().min(out.len());
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Build the 1024 byte header record for an archive
pub fn render_header(config: &VendorConfig, archive: &[u8], axis: &FrequencyAxis) -> Result<Vec<u8>> {
    let hash = hex::encode(Md5::digest(archive));
    let date = config.date.unwrap_or_else(|| Utc::now().date_naive());

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&[0u8; 30]);
    header.extend_from_slice(&fixed_field(&config.vendor));
    header.extend_from_slice(&fixed_field(&config.product));
    header.extend_from_slice(&fixed_field(&config.serial));
    header.extend_from_slice(&config.flags);
    header.extend_from_slice(&[0u8; 64]);

    // Connector must come before Module
    let text = format!(
        "Connector:{}\nModule:{}\nDesc:{}\nFrequency:{},{},{}\nData:0,{},{}\nDate:{}\n",
        config.connector,
        config.module,
        hash,
        axis.start,
        axis.stop,
        axis.count,
        archive.len(),
        hash,
        date.format("%Y-%m-%d"),
    );
    header.extend_from_slice(text.as_bytes());
    if header.len() > HEADER_LEN {
        return Err(CalError::Format(format!(
            "vendor header is {} bytes, limit is {}",
            header.len(),
            HEADER_LEN
        )));
    }
    header.resize(HEADER_LEN, 0);
    Ok(header)
}

fn compress(csv: &str) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));
    zip.start_file(CSV_NAME, options)?;
    zip.write_all(csv.as_bytes())?;
    Ok(zip.finish()?.into_inner())
}

/// Archive bytes and the header record describing them
#[derive(Clone, Debug, PartialEq)]
pub struct VendorBundle {
    pub archive: Vec<u8>,
    pub header: Vec<u8>,
    pub axis: FrequencyAxis,
}

impl VendorBundle {
    pub fn build(set: &StandardSet, config: &VendorConfig) -> Result<VendorBundle> {
        let (csv, axis) = render_csv(set, config)?;
        let archive = compress(&csv)?;
        debug!("Compressed {} byte table into {} bytes", csv.len(), archive.len());
        let header = render_header(config, &archive, &axis)?;
        Ok(VendorBundle {
            archive,
            header,
            axis,
        })
    }

    /// Write `data0.zip` and `info.dat` into `dir`, creating it if needed
    pub fn write_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(ARCHIVE_FILE), &self.archive)?;
        fs::write(dir.join(HEADER_FILE), &self.header)?;
        info!(
            "Wrote vendor bundle ({} points) to {}",
            self.axis.count,
            dir.display()
        );
        Ok(())
    }
}
