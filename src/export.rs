//! Serializers for a finished [`StandardSet`]
//!
//! Every format is an independent sink: a failure in one is reported for that
//! format only and does not prevent the others from being written.

use crate::config::CalConfig;
use crate::device::CalUnit;
use crate::error::{CalError, Result};
use crate::standard::StandardSet;
use core::fmt;
use simple_error::{bail, SimpleError};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

pub mod touchstone;
pub mod upload;
pub mod vendor;

pub use self::touchstone::{read_dir, read_touchstone, write_dir};
pub use self::upload::{upload, Coefficient};
pub use self::vendor::VendorBundle;

/// Sub-directory of the export directory holding the vendor bundle
pub const VENDOR_DIR: &str = "vendor";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Coefficient upload to the calibration unit
    Upload,
    /// One Touchstone file per standard
    Touchstone,
    /// Compressed vendor bundle plus binary header
    Vendor,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::Upload,
        ExportFormat::Touchstone,
        ExportFormat::Vendor,
    ];

    pub fn to_str(&self) -> &str {
        match self {
            ExportFormat::Upload => "upload",
            ExportFormat::Touchstone => "touchstone",
            ExportFormat::Vendor => "vendor",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = SimpleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload" => Ok(ExportFormat::Upload),
            "touchstone" | "snp" => Ok(ExportFormat::Touchstone),
            "vendor" => Ok(ExportFormat::Vendor),
            _ => bail!("unknown export format"),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Write `set` in each of `formats`.
///
/// Touchstone files go to `dir`, the vendor bundle to `dir/vendor`. Upload
/// needs a `unit`. Returns one result per requested format, in order.
pub fn export_all<U>(
    set: &StandardSet,
    config: &CalConfig,
    formats: &[ExportFormat],
    dir: &Path,
    mut unit: Option<&mut U>,
) -> Vec<(ExportFormat, Result<()>)>
where
    U: CalUnit + ?Sized,
{
    let mut results = Vec::with_capacity(formats.len());
    for &format in formats {
        let res = match format {
            ExportFormat::Upload => match unit.as_deref_mut() {
                Some(unit) => upload(
                    unit,
                    set,
                    &config.coefficient_class,
                    &config.coefficient_comments,
                )
                .map(|n| info!("Uploaded {} coefficients", n)),
                None => Err(CalError::InvalidConfig(
                    "no calibration unit to upload to".to_string(),
                )),
            },
            ExportFormat::Touchstone => fs::create_dir_all(dir)
                .map_err(CalError::from)
                .and_then(|_| write_dir(set, dir, &config.touchstone_comments))
                .map(|files| info!("Wrote {} Touchstone files to {}", files.len(), dir.display())),
            ExportFormat::Vendor => VendorBundle::build(set, &config.vendor)
                .and_then(|bundle| bundle.write_dir(&dir.join(VENDOR_DIR))),
        };
        if let Err(e) = &res {
            warn!("{} export failed: {}", format, e);
        }
        results.push((format, res));
    }
    results
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::SimulatedUnit;
    use crate::standard::StandardKind;
    use crate::trace;

    #[test]
    fn format_names() {
        for format in ExportFormat::ALL {
            assert_eq!(ExportFormat::from_str(format.to_str()).unwrap(), format);
        }
        assert!(ExportFormat::from_str("csv").is_err());
    }

    #[test]
    fn sinks_are_independent() {
        // one open only: touchstone succeeds, the vendor bundle is missing
        // standards and upload has no unit
        let mut set = StandardSet::new();
        set.insert(StandardKind::Open, 1, trace![(1e9, 1.0, 0.0)]);
        let dir = tempfile::tempdir().unwrap();
        let results = export_all::<SimulatedUnit>(
            &set,
            &CalConfig::default(),
            &[ExportFormat::Upload, ExportFormat::Vendor, ExportFormat::Touchstone],
            dir.path(),
            None,
        );
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], (ExportFormat::Upload, Err(CalError::InvalidConfig(_)))));
        assert!(matches!(results[1], (ExportFormat::Vendor, Err(CalError::MissingStandard(_)))));
        assert!(matches!(results[2], (ExportFormat::Touchstone, Ok(()))));
        assert!(dir.path().join("P1_OPEN.s1p").exists());
    }

    #[test]
    fn upload_through_driver() {
        let mut set = StandardSet::new();
        set.insert(StandardKind::Load, 2, trace![(1e9, 0.01, 0.0), (2e9, 0.02, 0.0)]);
        let mut unit = SimulatedUnit::new(2);
        let dir = tempfile::tempdir().unwrap();
        let results = export_all(
            &set,
            &CalConfig::default(),
            &[ExportFormat::Upload],
            dir.path(),
            Some(&mut unit),
        );
        assert!(results[0].1.is_ok());
        assert_eq!(unit.coefficient("FACTORY", "P2_LOAD").unwrap().points.len(), 2);
    }
}
