// 🗄️ SQLite store - entry infos (versioned), packs, snapshots, audit events
//
// Full records are stored as JSON in a `data` column; the other columns exist
// for lookups and indexes. Entry info rows are temporal: a new version closes
// the previous one (valid_until). Only an open, never-submitted version may
// have its data rewritten.

use crate::audit::{AuditEvent, AuditEventType};
use crate::entry::EntryInfo;
use crate::lifecycle::EntryPack;
use crate::snapshot::EntryPackSnapshot;
use crate::versioning::{TemporalEntity, VersionedValue};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Entry infos (one row per version)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entry_infos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            info_uuid TEXT NOT NULL,
            version INTEGER NOT NULL,
            traveler_id TEXT NOT NULL,
            destination TEXT NOT NULL,
            data TEXT NOT NULL,
            created_by TEXT NOT NULL,
            change_reason TEXT,
            valid_from TEXT NOT NULL,
            valid_until TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(info_uuid, version)
        )",
        [],
    )?;

    // ==========================================================================
    // Entry packs (latest state; history lives inside `data`)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entry_packs (
            pack_id TEXT PRIMARY KEY,
            entry_info_id TEXT NOT NULL,
            traveler_id TEXT NOT NULL,
            destination TEXT NOT NULL,
            status TEXT NOT NULL,
            arrival_at TEXT,
            version INTEGER NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            archived_at TEXT,
            deleted_at TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Snapshots (immutable)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id TEXT UNIQUE NOT NULL,
            pack_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Audit events (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            pack_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_infos_uuid ON entry_infos(info_uuid, version)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_packs_status ON entry_packs(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_packs_traveler ON entry_packs(traveler_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_pack ON snapshots(pack_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_pack ON audit_events(pack_id, timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// ENTRY INFOS
// ============================================================================

pub fn insert_entry_info_version(conn: &Connection, version: &VersionedValue<EntryInfo>) -> Result<()> {
    let data = serde_json::to_string(&version.value)?;

    conn.execute(
        "INSERT INTO entry_infos (
            info_uuid, version, traveler_id, destination, data,
            created_by, change_reason, valid_from, valid_until
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            version.value.id,
            version.version,
            version.value.traveler_id,
            version.value.destination,
            data,
            version.created_by,
            version.change_reason,
            version.valid_from.to_rfc3339(),
            version.valid_until.map(|dt| dt.to_rfc3339()),
        ],
    )
    .with_context(|| {
        format!(
            "Failed to insert entry info {} v{}",
            version.value.id, version.version
        )
    })?;

    Ok(())
}

/// Close the current version of an entry info
pub fn close_entry_info_version(
    conn: &Connection,
    info_id: &str,
    version: i64,
    valid_until: DateTime<Utc>,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE entry_infos SET valid_until = ?1
         WHERE info_uuid = ?2 AND version = ?3 AND valid_until IS NULL",
        params![valid_until.to_rfc3339(), info_id, version],
    )?;

    Ok(updated)
}

/// Rewrite the data of the open version (draft edits)
pub fn update_entry_info_data(
    conn: &Connection,
    info_id: &str,
    version: i64,
    info: &EntryInfo,
) -> Result<()> {
    let data = serde_json::to_string(info)?;

    let updated = conn.execute(
        "UPDATE entry_infos SET data = ?1
         WHERE info_uuid = ?2 AND version = ?3 AND valid_until IS NULL",
        params![data, info_id, version],
    )?;

    if updated == 0 {
        anyhow::bail!("Entry info {} v{} is closed or missing", info_id, version);
    }

    Ok(())
}

fn row_to_entry_info_version(row: &rusqlite::Row) -> rusqlite::Result<VersionedValue<EntryInfo>> {
    let data: String = row.get(0)?;
    let valid_from: String = row.get(4)?;
    let valid_until: Option<String> = row.get(5)?;

    Ok(VersionedValue {
        value: parse_json(0, &data)?,
        version: row.get(1)?,
        created_by: row.get(2)?,
        change_reason: row.get(3)?,
        valid_from: parse_time(4, &valid_from)?,
        valid_until: valid_until.map(|s| parse_time(5, &s)).transpose()?,
    })
}

/// Full version history of an entry info
pub fn get_entry_info_history(
    conn: &Connection,
    info_id: &str,
) -> Result<Option<TemporalEntity<EntryInfo>>> {
    let mut stmt = conn.prepare(
        "SELECT data, version, created_by, change_reason, valid_from, valid_until
         FROM entry_infos
         WHERE info_uuid = ?1
         ORDER BY version ASC",
    )?;

    let versions = stmt
        .query_map([info_id], row_to_entry_info_version)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TemporalEntity::from_versions(info_id, versions))
}

/// Latest version of an entry info
pub fn get_current_entry_info(
    conn: &Connection,
    info_id: &str,
) -> Result<Option<VersionedValue<EntryInfo>>> {
    let version = conn
        .query_row(
            "SELECT data, version, created_by, change_reason, valid_from, valid_until
             FROM entry_infos
             WHERE info_uuid = ?1
             ORDER BY version DESC
             LIMIT 1",
            [info_id],
            row_to_entry_info_version,
        )
        .optional()?;

    Ok(version)
}

// ============================================================================
// ENTRY PACKS
// ============================================================================

/// Insert or replace the latest state of a pack
pub fn save_pack(conn: &Connection, pack: &EntryPack) -> Result<()> {
    let data = serde_json::to_string(pack)?;

    conn.execute(
        "INSERT INTO entry_packs (
            pack_id, entry_info_id, traveler_id, destination, status, arrival_at,
            version, data, created_at, updated_at, archived_at, deleted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(pack_id) DO UPDATE SET
            status = excluded.status,
            arrival_at = excluded.arrival_at,
            version = excluded.version,
            data = excluded.data,
            updated_at = excluded.updated_at,
            archived_at = excluded.archived_at,
            deleted_at = excluded.deleted_at",
        params![
            pack.id,
            pack.entry_info_id,
            pack.traveler_id,
            pack.destination,
            pack.status.as_str(),
            pack.arrival_at.map(|dt| dt.to_rfc3339()),
            pack.version,
            data,
            pack.created_at.to_rfc3339(),
            pack.updated_at.to_rfc3339(),
            pack.archived_at.map(|dt| dt.to_rfc3339()),
            pack.deleted_at.map(|dt| dt.to_rfc3339()),
        ],
    )
    .with_context(|| format!("Failed to save pack {}", pack.id))?;

    Ok(())
}

pub fn get_pack(conn: &Connection, pack_id: &str) -> Result<Option<EntryPack>> {
    let pack = conn
        .query_row(
            "SELECT data FROM entry_packs WHERE pack_id = ?1",
            [pack_id],
            |row| {
                let data: String = row.get(0)?;
                parse_json(0, &data)
            },
        )
        .optional()?;

    Ok(pack)
}

/// All packs ordered by creation time
pub fn list_packs(conn: &Connection, include_deleted: bool) -> Result<Vec<EntryPack>> {
    let sql = if include_deleted {
        "SELECT data FROM entry_packs ORDER BY created_at ASC"
    } else {
        "SELECT data FROM entry_packs WHERE deleted_at IS NULL ORDER BY created_at ASC"
    };

    let mut stmt = conn.prepare(sql)?;
    let packs = stmt
        .query_map([], |row| {
            let data: String = row.get(0)?;
            parse_json(0, &data)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(packs)
}

/// Packs the archival job still has to look at
pub fn list_active_packs(conn: &Connection) -> Result<Vec<EntryPack>> {
    let mut stmt = conn.prepare(
        "SELECT data FROM entry_packs
         WHERE deleted_at IS NULL AND status != 'archived'
         ORDER BY arrival_at ASC",
    )?;

    let packs = stmt
        .query_map([], |row| {
            let data: String = row.get(0)?;
            parse_json(0, &data)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(packs)
}

pub fn count_packs_by_status(conn: &Connection, status: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entry_packs WHERE status = ?1 AND deleted_at IS NULL",
        [status],
        |row| row.get(0),
    )?;

    Ok(count)
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Insert a snapshot; an existing snapshot id is rejected (snapshots are immutable)
pub fn insert_snapshot(conn: &Connection, snapshot: &EntryPackSnapshot) -> Result<()> {
    let data = serde_json::to_string(snapshot)?;

    conn.execute(
        "INSERT INTO snapshots (snapshot_id, pack_id, reason, created_at, content_hash, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            snapshot.id,
            snapshot.pack_id,
            snapshot.reason.as_str(),
            snapshot.created_at.to_rfc3339(),
            snapshot.content_hash,
            data,
        ],
    )
    .with_context(|| format!("Failed to insert snapshot {}", snapshot.id))?;

    Ok(())
}

pub fn get_snapshots_for_pack(conn: &Connection, pack_id: &str) -> Result<Vec<EntryPackSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT data FROM snapshots WHERE pack_id = ?1 ORDER BY id ASC",
    )?;

    let snapshots = stmt
        .query_map([pack_id], |row| {
            let data: String = row.get(0)?;
            parse_json(0, &data)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(snapshots)
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

pub fn insert_audit_event(conn: &Connection, event: &AuditEvent) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO audit_events (event_id, timestamp, event_type, pack_id, actor, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.timestamp.to_rfc3339(),
            event.event_type.as_str(),
            event.pack_id,
            event.actor,
            data_json,
        ],
    )?;

    Ok(())
}

/// Audit events for a pack, oldest first
pub fn get_audit_events_for_pack(conn: &Connection, pack_id: &str) -> Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, pack_id, actor, data
         FROM audit_events
         WHERE pack_id = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map([pack_id], |row| {
            let timestamp: String = row.get(1)?;
            let event_type: String = row.get(2)?;
            let data: String = row.get(5)?;

            Ok(AuditEvent {
                id: row.get(0)?,
                timestamp: parse_time(1, &timestamp)?,
                event_type: event_type.parse::<AuditEventType>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
                })?,
                pack_id: row.get(3)?,
                actor: row.get(4)?,
                data: parse_json(5, &data)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
