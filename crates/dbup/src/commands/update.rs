//! Apply pending migrations without provisioning.

use crate::config::Config;
use crate::pool::ClientPool;
use anyhow::{Context, Result};
use colored::Colorize;
use dbup_core::{ClientApplier, ClientLocator, DbUpdater, HttpSnapshotSource};

pub fn execute(database: Option<&str>, config: &Config) -> Result<()> {
    let kinds = super::selected_kinds(database, config)?;

    let locator = ClientLocator::new(&config.client.executable);
    locator.ensure().context("SQL client executable check failed")?;

    let applier = ClientApplier::new(&locator);
    let snapshots = HttpSnapshotSource;

    for kind in kinds {
        let settings = config.updater_settings(kind);
        let pool = ClientPool::new(&locator, config.connection_info(kind))?;
        let updater = DbUpdater::new(kind, &pool, &applier, &snapshots, &settings);

        let result = updater
            .update()
            .with_context(|| format!("updating {kind} failed"))?;

        if result.updated {
            println!(
                "  {kind}: {} ({} new, {} archived)",
                "updated".green(),
                result.recent,
                result.archived
            );
        } else {
            println!("  {kind}: {}", "up-to-date".green());
        }
    }

    Ok(())
}
