//! Per-database-type policy table.
//!
//! Each database kind maps to exactly one static profile: config key, display
//! name, enabled bit, source subdirectory, and how its base snapshot is
//! resolved. The orchestrator relies on this table being exhaustive and
//! exclusive; nothing here has behavior beyond lookup.

use std::fmt;
use std::str::FromStr;

/// The four managed database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// Primary authentication/realm database.
    Auth,
    /// World content database.
    World,
    /// Player character database.
    Characters,
    /// Hotfix content database.
    Hotfixes,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 4] = [
        DatabaseKind::Auth,
        DatabaseKind::World,
        DatabaseKind::Characters,
        DatabaseKind::Hotfixes,
    ];

    pub fn profile(self) -> &'static DatabaseProfile {
        match self {
            DatabaseKind::Auth => &AUTH_PROFILE,
            DatabaseKind::World => &WORLD_PROFILE,
            DatabaseKind::Characters => &CHARACTERS_PROFILE,
            DatabaseKind::Hotfixes => &HOTFIXES_PROFILE,
        }
    }

    /// Bit test against the run-time enabled-database mask.
    pub fn is_enabled(self, mask: u32) -> bool {
        mask & self.profile().flag != 0
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().display_name)
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auth" => Ok(DatabaseKind::Auth),
            "world" => Ok(DatabaseKind::World),
            "characters" => Ok(DatabaseKind::Characters),
            "hotfixes" => Ok(DatabaseKind::Hotfixes),
            other => Err(format!(
                "unknown database kind '{other}' (expected auth, world, characters or hotfixes)"
            )),
        }
    }
}

/// How a database's base snapshot is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseLocation {
    /// A SQL dump bundled in the source repository.
    Repository,
    /// A SQL dump fetched from a configured URL.
    Download,
}

/// Static policy for one database kind.
#[derive(Debug)]
pub struct DatabaseProfile {
    pub kind: DatabaseKind,
    /// Key used in the config file's `[databases.*]` table.
    pub config_key: &'static str,
    /// Human-readable name used in diagnostics.
    pub display_name: &'static str,
    /// Bit in the enabled-database mask.
    pub flag: u32,
    /// Subdirectory under `sql/updates` and `sql/old` holding this
    /// database's migrations.
    pub update_subdir: &'static str,
    /// Base snapshot path relative to the source directory. For `Download`
    /// kinds this is also the download destination.
    pub base_file: &'static str,
    pub base_location: BaseLocation,
    /// Re-resolve the base snapshot even when the schema is non-empty.
    pub always_refresh: bool,
}

static AUTH_PROFILE: DatabaseProfile = DatabaseProfile {
    kind: DatabaseKind::Auth,
    config_key: "auth",
    display_name: "Auth",
    flag: 1 << 0,
    update_subdir: "auth",
    base_file: "sql/base/auth_database.sql",
    base_location: BaseLocation::Repository,
    always_refresh: false,
};

static WORLD_PROFILE: DatabaseProfile = DatabaseProfile {
    kind: DatabaseKind::World,
    config_key: "world",
    display_name: "World",
    flag: 1 << 1,
    update_subdir: "world",
    base_file: "sql/base/world_database.sql",
    base_location: BaseLocation::Download,
    always_refresh: true,
};

static CHARACTERS_PROFILE: DatabaseProfile = DatabaseProfile {
    kind: DatabaseKind::Characters,
    config_key: "characters",
    display_name: "Characters",
    flag: 1 << 2,
    update_subdir: "characters",
    base_file: "sql/base/characters_database.sql",
    base_location: BaseLocation::Repository,
    always_refresh: false,
};

static HOTFIXES_PROFILE: DatabaseProfile = DatabaseProfile {
    kind: DatabaseKind::Hotfixes,
    config_key: "hotfixes",
    display_name: "Hotfixes",
    flag: 1 << 3,
    update_subdir: "hotfixes",
    base_file: "sql/base/hotfixes_database.sql",
    base_location: BaseLocation::Download,
    always_refresh: true,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_profiles_are_exhaustive_and_exclusive() {
        let mut flags = HashSet::new();
        let mut keys = HashSet::new();
        for kind in DatabaseKind::ALL {
            let profile = kind.profile();
            assert_eq!(profile.kind, kind);
            assert!(flags.insert(profile.flag), "duplicate flag for {kind}");
            assert!(keys.insert(profile.config_key), "duplicate key for {kind}");
        }
    }

    #[test]
    fn test_enabled_mask_bit_test() {
        let mask = DatabaseKind::Auth.profile().flag | DatabaseKind::Characters.profile().flag;
        assert!(DatabaseKind::Auth.is_enabled(mask));
        assert!(DatabaseKind::Characters.is_enabled(mask));
        assert!(!DatabaseKind::World.is_enabled(mask));
        assert!(!DatabaseKind::Hotfixes.is_enabled(mask));
    }

    #[test]
    fn test_download_kinds_always_refresh() {
        for kind in DatabaseKind::ALL {
            let profile = kind.profile();
            assert_eq!(
                profile.always_refresh,
                profile.base_location == BaseLocation::Download
            );
        }
    }

    #[test]
    fn test_from_str_round_trip() {
        for kind in DatabaseKind::ALL {
            let parsed: DatabaseKind = kind.profile().config_key.parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("unknown".parse::<DatabaseKind>().is_err());
    }
}
