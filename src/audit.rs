// 🧾 Audit Trail - append-only events, stored twice
//
// Every event goes to the `audit_events` table and is mirrored as one JSON
// file under <data_dir>/audit/<pack_id>/. Snapshots are mirrored the same way
// under <data_dir>/snapshots/<pack_id>/. The database is authoritative; a
// failed mirror write is logged and does not fail the operation. Inside a
// transaction, writes are staged in a MirrorBatch and flushed after commit so
// a rollback never leaves files behind.

use crate::db;
use crate::snapshot::EntryPackSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Created,
    Viewed,
    StatusChanged,
    Deleted,
    Exported,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Created => "created",
            AuditEventType::Viewed => "viewed",
            AuditEventType::StatusChanged => "status_changed",
            AuditEventType::Deleted => "deleted",
            AuditEventType::Exported => "exported",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(AuditEventType::Created),
            "viewed" => Ok(AuditEventType::Viewed),
            "status_changed" => Ok(AuditEventType::StatusChanged),
            "deleted" => Ok(AuditEventType::Deleted),
            "exported" => Ok(AuditEventType::Exported),
            other => Err(format!("Unknown audit event type: {}", other)),
        }
    }
}

/// Audit event ("every change is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub pack_id: String,
    pub actor: String,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        pack_id: &str,
        actor: &str,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            event_type,
            pack_id: pack_id.to_string(),
            actor: actor.to_string(),
            data,
        }
    }

    /// File name inside the mirror: sortable timestamp + event id
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            self.id
        )
    }
}

// ============================================================================
// MIRROR REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub pack_id: String,
    pub db_events: usize,
    pub file_events: usize,
    /// Event ids in the database but not on disk
    pub missing_in_files: Vec<String>,
    /// Event ids on disk but not in the database
    pub missing_in_db: Vec<String>,
}

impl MirrorReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_in_files.is_empty() && self.missing_in_db.is_empty()
    }
}

// ============================================================================
// MIRROR BATCH
// ============================================================================

#[derive(Debug)]
enum MirrorWrite {
    Event(AuditEvent),
    Snapshot(EntryPackSnapshot),
}

/// Mirror writes waiting for their database transaction to commit
#[derive(Debug, Default)]
pub struct MirrorBatch {
    writes: Vec<MirrorWrite>,
}

impl MirrorBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

// ============================================================================
// AUDIT LOG
// ============================================================================

pub struct AuditLog {
    data_dir: PathBuf,
}

impl AuditLog {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        AuditLog {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn audit_dir(&self, pack_id: &str) -> PathBuf {
        self.data_dir.join("audit").join(pack_id)
    }

    pub fn snapshot_dir(&self, pack_id: &str) -> PathBuf {
        self.data_dir.join("snapshots").join(pack_id)
    }

    /// Append an event to the database, then mirror it to disk
    pub fn record(&self, conn: &Connection, event: &AuditEvent) -> Result<()> {
        let mut batch = MirrorBatch::new();
        self.stage_event(conn, event, &mut batch)?;
        self.flush(batch);
        Ok(())
    }

    /// Insert an event; its mirror file waits in `batch`
    pub fn stage_event(&self, conn: &Connection, event: &AuditEvent, batch: &mut MirrorBatch) -> Result<()> {
        db::insert_audit_event(conn, event)?;
        batch.writes.push(MirrorWrite::Event(event.clone()));

        tracing::debug!(
            event_type = %event.event_type,
            pack_id = %event.pack_id,
            "audit event recorded"
        );
        Ok(())
    }

    /// Insert a snapshot; its mirror file waits in `batch`
    pub fn stage_snapshot(
        &self,
        conn: &Connection,
        snapshot: &EntryPackSnapshot,
        batch: &mut MirrorBatch,
    ) -> Result<()> {
        db::insert_snapshot(conn, snapshot)?;
        batch.writes.push(MirrorWrite::Snapshot(snapshot.clone()));
        Ok(())
    }

    /// Write staged mirror files; returns how many were written
    pub fn flush(&self, batch: MirrorBatch) -> usize {
        let mut written = 0;

        for write in batch.writes {
            match write {
                MirrorWrite::Event(event) => match self.mirror_event(&event) {
                    Ok(_) => written += 1,
                    Err(e) => tracing::warn!(
                        event_id = %event.id,
                        pack_id = %event.pack_id,
                        error = %e,
                        "audit mirror write failed"
                    ),
                },
                MirrorWrite::Snapshot(snapshot) => {
                    let path = self
                        .snapshot_dir(&snapshot.pack_id)
                        .join(format!("{}.json", snapshot.id));
                    match snapshot.write_json(&path) {
                        Ok(()) => written += 1,
                        Err(e) => tracing::warn!(
                            snapshot_id = %snapshot.id,
                            error = %e,
                            "snapshot mirror write failed"
                        ),
                    }
                }
            }
        }

        written
    }

    pub fn mirror_event(&self, event: &AuditEvent) -> Result<PathBuf> {
        let dir = self.audit_dir(&event.pack_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audit directory: {:?}", dir))?;

        let path = dir.join(event.file_name());
        let json = serde_json::to_string_pretty(event)?;
        fs::write(&path, json).with_context(|| format!("Failed to write audit file: {:?}", path))?;
        Ok(path)
    }

    /// Store a snapshot in the database and mirror it to disk
    pub fn record_snapshot(&self, conn: &Connection, snapshot: &EntryPackSnapshot) -> Result<()> {
        let mut batch = MirrorBatch::new();
        self.stage_snapshot(conn, snapshot, &mut batch)?;
        self.flush(batch);
        Ok(())
    }

    /// Events mirrored on disk for a pack, oldest first
    pub fn read_mirror(&self, pack_id: &str) -> Result<Vec<AuditEvent>> {
        let dir = self.audit_dir(pack_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read audit directory: {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut events = Vec::with_capacity(paths.len());
        for path in paths {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read audit file: {:?}", path))?;
            let event: AuditEvent = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse audit file: {:?}", path))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Compare the database log with the file mirror for one pack
    pub fn verify_mirror(&self, conn: &Connection, pack_id: &str) -> Result<MirrorReport> {
        let db_events = db::get_audit_events_for_pack(conn, pack_id)?;
        let file_events = self.read_mirror(pack_id)?;

        let db_ids: BTreeSet<&str> = db_events.iter().map(|e| e.id.as_str()).collect();
        let file_ids: BTreeSet<&str> = file_events.iter().map(|e| e.id.as_str()).collect();

        Ok(MirrorReport {
            pack_id: pack_id.to_string(),
            db_events: db_events.len(),
            file_events: file_events.len(),
            missing_in_files: db_ids.difference(&file_ids).map(|s| s.to_string()).collect(),
            missing_in_db: file_ids.difference(&db_ids).map(|s| s.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryInfo;
    use crate::lifecycle::EntryPack;
    use crate::snapshot::SnapshotReason;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap()
    }

    fn setup() -> (Connection, tempfile::TempDir, AuditLog) {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        (conn, dir, log)
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(
            "status_changed".parse::<AuditEventType>().unwrap(),
            AuditEventType::StatusChanged
        );
        assert!("edited".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn test_record_writes_both_stores() {
        let (conn, _dir, log) = setup();

        for (i, kind) in [AuditEventType::Created, AuditEventType::Viewed, AuditEventType::Exported]
            .into_iter()
            .enumerate()
        {
            let event = AuditEvent::new(
                kind,
                "pack-1",
                "traveler-1",
                serde_json::json!({"seq": i}),
                now() + Duration::seconds(i as i64),
            );
            log.record(&conn, &event).unwrap();
        }

        let mirrored = log.read_mirror("pack-1").unwrap();
        assert_eq!(mirrored.len(), 3);
        assert_eq!(mirrored[0].event_type, AuditEventType::Created);
        assert_eq!(mirrored[2].event_type, AuditEventType::Exported);

        let report = log.verify_mirror(&conn, "pack-1").unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.db_events, 3);
    }

    #[test]
    fn test_verify_mirror_detects_gaps() {
        let (conn, _dir, log) = setup();

        // Only in the database
        let db_only = AuditEvent::new(AuditEventType::Viewed, "pack-1", "a", serde_json::Value::Null, now());
        db::insert_audit_event(&conn, &db_only).unwrap();

        // Only on disk
        let file_only = AuditEvent::new(AuditEventType::Deleted, "pack-1", "a", serde_json::Value::Null, now());
        log.mirror_event(&file_only).unwrap();

        let report = log.verify_mirror(&conn, "pack-1").unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.missing_in_files, vec![db_only.id.clone()]);
        assert_eq!(report.missing_in_db, vec![file_only.id.clone()]);
    }

    #[test]
    fn test_staged_writes_wait_for_flush() {
        let (conn, _dir, log) = setup();
        let mut batch = MirrorBatch::new();

        let event = AuditEvent::new(AuditEventType::Created, "pack-1", "a", serde_json::Value::Null, now());
        log.stage_event(&conn, &event, &mut batch).unwrap();

        assert_eq!(batch.len(), 1);
        assert!(log.read_mirror("pack-1").unwrap().is_empty());

        assert_eq!(log.flush(batch), 1);
        assert!(log.verify_mirror(&conn, "pack-1").unwrap().is_consistent());
    }

    #[test]
    fn test_dropped_batch_writes_nothing() {
        let (conn, _dir, log) = setup();
        let tx = conn.unchecked_transaction().unwrap();
        let mut batch = MirrorBatch::new();

        let event = AuditEvent::new(AuditEventType::Deleted, "pack-1", "a", serde_json::Value::Null, now());
        log.stage_event(&tx, &event, &mut batch).unwrap();
        drop(tx);
        drop(batch);

        assert!(db::get_audit_events_for_pack(&conn, "pack-1").unwrap().is_empty());
        assert!(!log.audit_dir("pack-1").exists());
    }

    #[test]
    fn test_empty_mirror() {
        let (_conn, _dir, log) = setup();
        assert!(log.read_mirror("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_record_snapshot_mirrors_file() {
        let (conn, _dir, log) = setup();
        let info = EntryInfo::new("traveler-1", "MY");
        let pack = EntryPack::new(&info, None, now());
        let snapshot = EntryPackSnapshot::capture(
            &pack,
            &info,
            SnapshotReason::Submitted,
            "traveler-1",
            40,
            serde_json::Value::Null,
            now(),
        )
        .unwrap();

        log.record_snapshot(&conn, &snapshot).unwrap();

        let path = log.snapshot_dir(&pack.id).join(format!("{}.json", snapshot.id));
        assert!(path.exists());
        assert_eq!(db::get_snapshots_for_pack(&conn, &pack.id).unwrap().len(), 1);
    }

    #[test]
    fn test_file_names_sort_chronologically() {
        let early = AuditEvent::new(AuditEventType::Created, "p", "a", serde_json::Value::Null, now());
        let late = AuditEvent::new(
            AuditEventType::Viewed,
            "p",
            "a",
            serde_json::Value::Null,
            now() + Duration::milliseconds(5),
        );
        assert!(early.file_name() < late.file_name());
    }
}
