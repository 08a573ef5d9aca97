//! # Norn: A Pluggable Static-Analysis Driver
//!
//! Norn runs a registry of independent checker plugins over a corpus of
//! source files, decides per message, per scope, and per line whether each
//! finding should be reported, and scales the pass across a worker pool
//! without changing the result a single-worker run would have produced.
//!
//! The crate is organized around three subsystems:
//!
//! - **Message state**: a catalog of diagnostic definitions plus a tracker
//!   that resolves enablement at package, module, or single-line granularity,
//!   including inline pragma directives, confidence filtering, renamed
//!   message aliases, and useless-suppression detection.
//! - **Check orchestration**: a sequential driver and a map-reduce parallel
//!   orchestrator that produce equivalent diagnostics and statistics.
//! - **Duplicate-line detection**: the reference map-reduce checker, an
//!   indexed line-granularity near-duplicate finder across N files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use norn_rs::core::config::NornConfig;
//! use norn_rs::core::checkers::CheckerRegistry;
//! use norn_rs::core::driver::SequentialDriver;
//! use norn_rs::core::reporter::TextReporter;
//! use norn_rs::lang::IndentParser;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NornConfig::default();
//!     let registry = CheckerRegistry::with_builtin_checkers();
//!     let parser = IndentParser::new();
//!     let mut reporter = TextReporter::stdout();
//!     let mut driver = SequentialDriver::new(&config, &registry, &parser)?;
//!     let outcome = driver.run(&["src/app.nn".into()], &mut reporter)?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Core driver modules
pub mod core {
    //! Message state, check orchestration, and run bookkeeping.

    pub mod checkers;
    pub mod config;
    pub mod driver;
    pub mod errors;
    pub mod msgs;
    pub mod orchestrator;
    pub mod reporter;
    pub mod state;
    pub mod stats;
}

// Bundled checkers
pub mod detectors {
    //! Checker implementations shipped with the driver.

    pub mod raw;
    pub mod similarity;
}

// Parsing seam for guest languages
pub mod lang;

// Re-export the types most integrations need
pub use crate::core::config::NornConfig;
pub use crate::core::errors::{NornError, Result};
pub use crate::core::msgs::{Category, Confidence, Message, MessageCatalog, MessageDefinition};
pub use crate::core::stats::RunStats;
