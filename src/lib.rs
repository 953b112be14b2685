pub mod assembler;
pub mod config;
pub mod device;
pub mod error;
pub mod export;
pub mod limits;
pub mod math;
pub mod parameter;
pub mod planner;
pub mod prelude;
pub mod run;
pub mod scale;
pub mod source;
pub mod standard;
pub mod sweep;
pub mod trace;

pub use num::complex::Complex64;

/// Create a **[`Trace`](crate::trace::Trace)** from `(freq, re, im)` tuples.
///
/// ```
/// use calkit::trace;
/// let t = trace![(1e9, 0.5, -0.1),
///                (2e9, 0.4, -0.2)];
///
/// assert_eq!(t.len(), 2);
/// assert_eq!(t[1].freq, 2e9);
/// ```
///
/// This macro uses `vec![]`, and has the same ownership semantics.
///
#[macro_export]
macro_rules! trace {
    ($(($f:expr, $re:expr, $im:expr)),* $(,)*) => {{
        $crate::trace::Trace::new(vec![$($crate::trace::Sample::new($f, $crate::Complex64::new($re, $im)),)*])
    }};
}
