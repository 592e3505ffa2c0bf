//! Full provisioning: create, populate, update.

use crate::config::Config;
use crate::pool::ClientPool;
use crate::prompt::ConsolePrompt;
use anyhow::{Context, Result};
use dbup_core::{ClientApplier, ClientLocator, DbUpdater, HttpSnapshotSource, ProvisionState};
use tracing::{error, info};

pub fn execute(database: Option<&str>, config: &Config) -> Result<()> {
    let kinds = super::selected_kinds(database, config)?;

    let locator = ClientLocator::new(&config.client.executable);
    locator.ensure().context("SQL client executable check failed")?;

    let applier = ClientApplier::new(&locator);
    let snapshots = HttpSnapshotSource;
    let mut prompt = ConsolePrompt;

    for kind in kinds {
        let settings = config.updater_settings(kind);
        let pool = ClientPool::new(&locator, config.connection_info(kind))?;
        let updater = DbUpdater::new(kind, &pool, &applier, &snapshots, &settings);

        let mut state = if pool.database_exists()? {
            ProvisionState::Empty
        } else {
            ProvisionState::Absent
        };

        if state == ProvisionState::Absent {
            state = ProvisionState::Creating;
            if let Err(e) = updater.create() {
                error!("{kind} database failed while {state}");
                return Err(e).with_context(|| format!("provisioning {kind} failed while {state}"));
            }
        }

        state = ProvisionState::Populating;
        if let Err(e) = updater.populate(&mut prompt) {
            error!("{kind} database failed while {state}");
            return Err(e).with_context(|| format!("provisioning {kind} failed while {state}"));
        }

        state = ProvisionState::Updating;
        if let Err(e) = updater.update() {
            error!("{kind} database failed while {state}");
            return Err(e).with_context(|| format!("provisioning {kind} failed while {state}"));
        }

        state = ProvisionState::Ready;
        info!("{kind} database is {state}");
    }

    Ok(())
}
