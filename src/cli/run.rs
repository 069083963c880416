//! `allegro-billing run` handler.

use std::sync::Arc;

use chrono::Local;

use super::{print_grant, RunArgs};
use crate::auth::AuthMode;
use crate::billing::WindowPolicy;
use crate::error::BillingError;
use crate::extractor::{Extractor, RunOptions, RunSummary};
use crate::util::lock::RunLock;

/// Handle `allegro-billing run`.
pub async fn handle_run(args: RunArgs) -> Result<RunSummary, BillingError> {
    let config = args.config.load()?;
    let _lock = RunLock::acquire(&config.paths.state_dir, &config.profile)?;
    let extractor = Extractor::builder(&config)
        .prompt(Arc::new(print_grant))
        .build()?;

    let mut options = RunOptions::from_config(&config, Local::now().date_naive());
    if args.manual_auth {
        options.mode = AuthMode::Manual;
    }
    if args.daily {
        options.policy = WindowPolicy::DailyIncremental;
    }
    if let (Some(start), Some(end)) = (args.from, args.to) {
        options.policy = WindowPolicy::Explicit { start, end };
    }

    let summary = extractor.run(options).await?;
    println!(
        "✅ {} entries for {}..={} written to {}",
        summary.entries,
        summary.window.start(),
        summary.window.end(),
        summary.output.display()
    );
    Ok(summary)
}
