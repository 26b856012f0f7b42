//! Shared building blocks of the SAFT Doctor client: backend data model,
//! error taxonomy, configuration, fix-list construction and the validation
//! verdict.

pub mod config;
pub mod error;
pub mod fixes;
pub mod models;
pub mod verdict;

pub use config::ClientConfig;
pub use error::{backend_message, ClientError, ErrorMetadata, LogLevel};
pub use fixes::{build_fix_list, SuggestionSelections};
pub use verdict::{Severity, Verdict, TIMEOUT_HINT};
