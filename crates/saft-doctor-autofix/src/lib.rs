//! Auto-fix convergence loop.
//!
//! Starting from a finished upload, the loop validates the file, sends every
//! fixable issue back to the backend, and repeats on the re-validation result
//! until the file is clean, nothing more can be fixed, the iteration cap is
//! reached, a request fails, or the caller cancels.

pub mod backend;
pub mod report;
pub mod run;

pub use backend::FixBackend;
pub use report::{AutoFixReport, LoopState, Submission};
pub use run::{AutoFixConfig, AutoFixLoop};
