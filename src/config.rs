use std::path::PathBuf;

use crate::arrival::DEFAULT_URGENT_HOURS;
use crate::lifecycle::DEFAULT_ARCHIVE_GRACE_HOURS;

/// Upper bound for any hour-valued setting (ten years)
pub const MAX_HOURS: i64 = 87_600;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Root of the JSON mirror (audit/, snapshots/, exports/)
    pub data_dir: PathBuf,
    pub log_level: String,
    pub archive_grace_hours: i64,
    pub urgent_hours: i64,
    /// Optional JSON file with destination overrides
    pub destinations_file: Option<PathBuf>,
    /// Actor recorded on audit events from this process
    pub actor: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (lets tests avoid touching the process env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let data_dir = PathBuf::from(get_or("ENTRY_PACK_DATA_DIR", "./entry-pack-data"));

        let database_path = lookup("ENTRY_PACK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("entry_packs.db"));

        let archive_grace_hours: i64 = get_or(
            "ENTRY_PACK_ARCHIVE_GRACE_HOURS",
            &DEFAULT_ARCHIVE_GRACE_HOURS.to_string(),
        )
        .parse()
        .map_err(|e| format!("Invalid ENTRY_PACK_ARCHIVE_GRACE_HOURS: {e}"))?;

        let urgent_hours: i64 = get_or("ENTRY_PACK_URGENT_HOURS", &DEFAULT_URGENT_HOURS.to_string())
            .parse()
            .map_err(|e| format!("Invalid ENTRY_PACK_URGENT_HOURS: {e}"))?;

        for (key, value) in [
            ("ENTRY_PACK_ARCHIVE_GRACE_HOURS", archive_grace_hours),
            ("ENTRY_PACK_URGENT_HOURS", urgent_hours),
        ] {
            if !(0..=MAX_HOURS).contains(&value) {
                return Err(format!("{key} must be between 0 and {MAX_HOURS}, got {value}"));
            }
        }

        let destinations_file = lookup("ENTRY_PACK_DESTINATIONS")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Config {
            database_path,
            data_dir,
            log_level: get_or("ENTRY_PACK_LOG_LEVEL", "info"),
            archive_grace_hours,
            urgent_hours,
            destinations_file,
            actor: get_or("ENTRY_PACK_ACTOR", "cli"),
        })
    }
}
