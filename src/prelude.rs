//! calkit prelude.
//!
//! This module contains the most used types, traits, and functions that you
//! can import easily as a group.
//!
//! ```
//! use calkit::prelude::*;
//!
//! ```

#[doc(no_inline)]
pub use crate::config::{CalConfig, VendorConfig};

#[doc(no_inline)]
pub use crate::device::{CalUnit, PortState, ScpiUnit, SimulatedUnit};

#[doc(no_inline)]
pub use crate::error::{CalError, ErrorKind, Result};

#[doc(no_inline)]
pub use crate::export::{export_all, ExportFormat};

#[doc(no_inline)]
pub use crate::limits::{validate, validate_all, Limit, LimitFile, ValidationReport, Violation};

#[doc(no_inline)]
pub use crate::parameter::{DataFormat, SParam};

#[doc(no_inline)]
pub use crate::planner::{plan, ConnectionStep};

#[doc(no_inline)]
pub use crate::run::{CalibrationRun, LoggingOperator, Operator, Progress, RunOutcome};

#[doc(no_inline)]
pub use crate::scale::Scale;

#[doc(no_inline)]
pub use crate::source::{SimulatedVna, SweepSource};

#[doc(no_inline)]
pub use crate::standard::{PortPair, StandardKind, StandardSet, ThroughSet};

#[doc(no_inline)]
pub use crate::sweep::Sweep;

#[doc(no_inline)]
pub use crate::trace::{Sample, Trace};
