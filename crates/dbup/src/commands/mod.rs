//! Command implementations.

pub mod doctor;
pub mod provision;
pub mod update;

use crate::config::Config;
use anyhow::{bail, Result};
use dbup_core::DatabaseKind;

/// Resolve the kinds a command should act on.
///
/// An explicit `--database` must name an enabled kind; otherwise every kind
/// enabled in the config is processed, in fixed order.
pub(crate) fn selected_kinds(database: Option<&str>, config: &Config) -> Result<Vec<DatabaseKind>> {
    let mask = config.enabled_mask();

    match database {
        Some(name) => {
            let kind: DatabaseKind = name.parse().map_err(anyhow::Error::msg)?;
            if !kind.is_enabled(mask) {
                bail!("database '{kind}' is disabled in the config");
            }
            Ok(vec![kind])
        }
        None => Ok(DatabaseKind::ALL
            .into_iter()
            .filter(|kind| kind.is_enabled(mask))
            .collect()),
    }
}
