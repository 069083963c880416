//! Incremental Allegro billing-entry extractor.
//!
//! Obtains a user-delegated OAuth credential (device-code flow or refresh),
//! downloads billing entries for a date window page by page, flattens them
//! into a fixed-column table and records the run so the next one can pick
//! up where this one stopped.
//!
//! # Quick Start
//!
//! ```no_run
//! use allegro_billing::config::ExtractorConfig;
//! use allegro_billing::extractor::{Extractor, RunOptions};
//!
//! # async fn example() -> allegro_billing::error::Result<()> {
//! let config = ExtractorConfig::load(None)?;
//! let extractor = Extractor::from_config(&config)?;
//! let today = chrono::Local::now().date_naive();
//! let summary = extractor.run(RunOptions::from_config(&config, today)).await?;
//! println!("{} entries -> {}", summary.entries, summary.output.display());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod output;
pub mod util;
