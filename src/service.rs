// 🧭 Entry Pack Service - lifecycle operations against the store
//
// Each state-changing operation writes the pack, an immutable snapshot and an
// audit event in one SQLite transaction. JSON mirror files are staged during
// the transaction and written only once it has committed (best-effort).

use crate::arrival::{arrival_instant, assess_readiness, ArrivalWindow, ArrivalWindowCalculator, SubmissionReadiness};
use crate::audit::{AuditEvent, AuditEventType, AuditLog, MirrorBatch, MirrorReport};
use crate::completion::{CompletionCalculator, CompletionMetrics};
use crate::config::Config;
use crate::db;
use crate::destinations::{Destination, DestinationRegistry};
use crate::entry::EntryInfo;
use crate::lifecycle::{
    display_status, due_transition, DisplayStatus, EntryPack, PackStatus, SubmissionAttempt,
    SubmissionMethod,
};
use crate::snapshot::{EntryPackSnapshot, SnapshotReason};
use crate::validation::{validate_entry_info, ValidationContext, ValidationError};
use crate::versioning::{TemporalEntity, VersionedValue};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::Path;

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PackStatusReport {
    pub pack: EntryPack,
    pub destination_name: String,
    pub completion: CompletionMetrics,
    pub window: ArrivalWindow,
    pub readiness: SubmissionReadiness,
    pub display: DisplayStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Pick the format from the file extension (defaults to JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// CSV row for one submission attempt
#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    pack_id: &'a str,
    attempt_id: &'a str,
    submitted_at: String,
    method: &'a str,
    outcome: &'a str,
    confirmation_number: &'a str,
    error: &'a str,
    entry_info_version: i64,
}

fn validation_error(errors: Vec<ValidationError>) -> anyhow::Error {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    anyhow!("Validation failed: {}", messages.join("; "))
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct EntryPackService {
    conn: Connection,
    audit: AuditLog,
    destinations: DestinationRegistry,
    completion: CompletionCalculator,
    windows: ArrivalWindowCalculator,
    archive_grace: Duration,
    actor: String,
}

impl EntryPackService {
    pub fn new(conn: Connection, audit: AuditLog, destinations: DestinationRegistry) -> Result<Self> {
        db::setup_database(&conn)?;

        Ok(EntryPackService {
            conn,
            audit,
            destinations,
            completion: CompletionCalculator::new(),
            windows: ArrivalWindowCalculator::new(),
            archive_grace: Duration::hours(crate::lifecycle::DEFAULT_ARCHIVE_GRACE_HOURS),
            actor: "system".to_string(),
        })
    }

    /// Open the database and mirror described by the config
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;
        if let Some(parent) = config.database_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(&config.database_path)
            .with_context(|| format!("Failed to open database: {:?}", config.database_path))?;

        let mut destinations = DestinationRegistry::new();
        if let Some(path) = &config.destinations_file {
            destinations.load_overrides(path)?;
        }

        let service = EntryPackService::new(conn, AuditLog::new(&config.data_dir), destinations)?
            .with_archive_grace_hours(config.archive_grace_hours)
            .with_urgent_hours(config.urgent_hours)
            .with_actor(&config.actor);

        tracing::info!(db = ?config.database_path, data_dir = ?config.data_dir, "entry pack store opened");
        Ok(service)
    }

    pub fn with_archive_grace_hours(mut self, hours: i64) -> Self {
        self.archive_grace = Duration::hours(hours);
        self
    }

    pub fn with_urgent_hours(mut self, hours: i64) -> Self {
        self.windows = ArrivalWindowCalculator::with_urgent_hours(hours);
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn destinations(&self) -> &DestinationRegistry {
        &self.destinations
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn get_pack(&self, pack_id: &str) -> Result<EntryPack> {
        db::get_pack(&self.conn, pack_id)?.ok_or_else(|| anyhow!("Pack not found: {}", pack_id))
    }

    fn get_active_pack(&self, pack_id: &str) -> Result<EntryPack> {
        let pack = self.get_pack(pack_id)?;
        if pack.is_deleted() {
            bail!("Pack {} was deleted", pack_id);
        }
        Ok(pack)
    }

    pub fn current_entry_info(&self, pack: &EntryPack) -> Result<VersionedValue<EntryInfo>> {
        db::get_current_entry_info(&self.conn, &pack.entry_info_id)?
            .ok_or_else(|| anyhow!("Entry info {} missing for pack {}", pack.entry_info_id, pack.id))
    }

    pub fn entry_info_history(&self, pack_id: &str) -> Result<TemporalEntity<EntryInfo>> {
        let pack = self.get_pack(pack_id)?;
        db::get_entry_info_history(&self.conn, &pack.entry_info_id)?
            .ok_or_else(|| anyhow!("Entry info {} missing for pack {}", pack.entry_info_id, pack.id))
    }

    pub fn snapshots(&self, pack_id: &str) -> Result<Vec<EntryPackSnapshot>> {
        db::get_snapshots_for_pack(&self.conn, pack_id)
    }

    pub fn history(&self, pack_id: &str) -> Result<Vec<AuditEvent>> {
        db::get_audit_events_for_pack(&self.conn, pack_id)
    }

    pub fn verify_mirror(&self, pack_id: &str) -> Result<MirrorReport> {
        self.audit.verify_mirror(&self.conn, pack_id)
    }

    fn destination_for(&self, code: &str) -> Result<&Destination> {
        self.destinations.get(code)
    }

    // ========================================================================
    // DERIVED STATE
    // ========================================================================

    pub fn compute_completion(&self, info: &EntryInfo) -> Result<CompletionMetrics> {
        let destination = self.destination_for(&info.destination)?;
        Ok(self.completion.compute(info, destination))
    }

    /// Completion, window, readiness and display status for a pack
    pub fn status_report(&self, pack: &EntryPack, now: DateTime<Utc>) -> Result<PackStatusReport> {
        let info = self.current_entry_info(pack)?;
        let destination = self.destination_for(&pack.destination)?;

        let completion = self.completion.compute(&info.value, destination);
        let window = self.windows.compute(pack.arrival_at, destination, now);
        let readiness = assess_readiness(
            &completion,
            &window,
            pack.status == PackStatus::Submitted,
            pack.status.is_terminal(),
        );
        let display = display_status(pack, &completion, &window);

        Ok(PackStatusReport {
            pack: pack.clone(),
            destination_name: destination.name.clone(),
            completion,
            window,
            readiness,
            display,
        })
    }

    /// Reports for every non-deleted pack
    pub fn list_reports(&self, now: DateTime<Utc>) -> Result<Vec<PackStatusReport>> {
        db::list_packs(&self.conn, false)?
            .iter()
            .map(|pack| self.status_report(pack, now))
            .collect()
    }

    /// Readiness check before handing the data to a government portal
    pub fn prepare_submission(&self, pack_id: &str, now: DateTime<Utc>) -> Result<SubmissionReadiness> {
        let pack = self.get_active_pack(pack_id)?;
        let info = self.current_entry_info(&pack)?;
        let destination = self.destination_for(&pack.destination)?;

        validate_entry_info(&info.value, destination, ValidationContext::Submission)
            .map_err(validation_error)?;

        Ok(self.status_report(&pack, now)?.readiness)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    fn take_snapshot(
        &self,
        conn: &Connection,
        pack: &EntryPack,
        info: &VersionedValue<EntryInfo>,
        reason: SnapshotReason,
        now: DateTime<Utc>,
        mirror: &mut MirrorBatch,
    ) -> Result<EntryPackSnapshot> {
        let percent = self.compute_completion(&info.value)?.percent;
        let metadata = serde_json::json!({
            "entry_info_version": info.version,
            "status": pack.status.as_str(),
            "app_version": crate::VERSION,
        });

        let snapshot = EntryPackSnapshot::capture(
            pack,
            &info.value,
            reason,
            &self.actor,
            percent,
            metadata,
            now,
        )?;
        self.audit.stage_snapshot(conn, &snapshot, mirror)?;
        Ok(snapshot)
    }

    fn record_event(
        &self,
        conn: &Connection,
        event_type: AuditEventType,
        pack_id: &str,
        data: serde_json::Value,
        now: DateTime<Utc>,
        mirror: &mut MirrorBatch,
    ) -> Result<()> {
        let event = AuditEvent::new(event_type, pack_id, &self.actor, data, now);
        self.audit.stage_event(conn, &event, mirror)
    }

    /// Record an event outside any transaction
    fn record_event_now(
        &self,
        event_type: AuditEventType,
        pack_id: &str,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let event = AuditEvent::new(event_type, pack_id, &self.actor, data, now);
        self.audit.record(&self.conn, &event)
    }

    /// Create a pack for a new entry info (version 1)
    pub fn create_pack(&self, mut info: EntryInfo, now: DateTime<Utc>) -> Result<EntryPack> {
        info.destination = info.destination.trim().to_uppercase();
        let destination = self.destination_for(&info.destination)?;

        validate_entry_info(&info, destination, ValidationContext::Draft)
            .map_err(validation_error)?;

        let arrival_at = arrival_instant(&info.travel, destination);
        let percent = self.completion.compute(&info, destination).percent;
        let pack = EntryPack::new(&info, arrival_at, now);
        let version = VersionedValue::new(info, &self.actor, now);

        let mut mirror = MirrorBatch::new();
        let tx = self.conn.unchecked_transaction()?;
        db::insert_entry_info_version(&tx, &version)?;
        db::save_pack(&tx, &pack)?;
        self.record_event(
            &tx,
            AuditEventType::Created,
            &pack.id,
            serde_json::json!({
                "destination": pack.destination,
                "entry_info_id": pack.entry_info_id,
                "completion_percent": percent,
            }),
            now,
            &mut mirror,
        )?;
        tx.commit()?;
        self.audit.flush(mirror);

        tracing::info!(pack_id = %pack.id, destination = %pack.destination, "entry pack created");
        Ok(pack)
    }

    /// Save edited traveler data
    ///
    /// While the current version has never been submitted it is edited in
    /// place; once submitted, edits supersede it with a new version.
    pub fn update_entry_info(
        &self,
        pack_id: &str,
        mut info: EntryInfo,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EntryPack> {
        let mut pack = self.get_active_pack(pack_id)?;
        if pack.status.is_terminal() {
            bail!("Pack {} is {} and can no longer be edited", pack.id, pack.status);
        }

        let current = self.current_entry_info(&pack)?;
        info.id = pack.entry_info_id.clone();
        info.traveler_id = pack.traveler_id.clone();
        info.destination = pack.destination.clone();
        info.touch(now);

        let destination = self.destination_for(&pack.destination)?;
        validate_entry_info(&info, destination, ValidationContext::Draft)
            .map_err(validation_error)?;

        let arrival_at = arrival_instant(&info.travel, destination);
        let submitted = pack
            .submission_history
            .iter()
            .any(|a| a.is_accepted() && a.entry_info_version == current.version);

        let tx = self.conn.unchecked_transaction()?;
        if submitted {
            let mut entity = TemporalEntity::from_versions(&info.id, vec![current.clone()])
                .ok_or_else(|| anyhow!("Entry info {} has no versions", info.id))?;
            let next = entity.update(info, &self.actor, reason, now);

            let closed = db::close_entry_info_version(&tx, &pack.entry_info_id, current.version, now)?;
            if closed == 0 {
                bail!(
                    "Entry info {} v{} was already superseded",
                    pack.entry_info_id,
                    current.version
                );
            }
            if let Some(new_version) = entity.at_version(next) {
                db::insert_entry_info_version(&tx, new_version)?;
            }
            tracing::info!(pack_id = %pack.id, version = next, "entry info superseded");
        } else {
            db::update_entry_info_data(&tx, &pack.entry_info_id, current.version, &info)?;
        }

        pack.update_arrival(arrival_at, now)?;
        db::save_pack(&tx, &pack)?;
        tx.commit()?;

        Ok(pack)
    }

    /// Record a portal response: `Ok(confirmation)` or `Err(error)`
    pub fn record_submission(
        &self,
        pack_id: &str,
        method: SubmissionMethod,
        response: Result<&str, &str>,
        now: DateTime<Utc>,
    ) -> Result<EntryPack> {
        match response {
            Ok(confirmation_number) => self.submit(pack_id, method, confirmation_number, now),
            Err(error) => self.record_failed_submission(pack_id, method, error, now),
        }
    }

    /// Record an accepted submission (confirmation number from the portal)
    pub fn submit(
        &self,
        pack_id: &str,
        method: SubmissionMethod,
        confirmation_number: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryPack> {
        let mut pack = self.get_active_pack(pack_id)?;
        let info = self.current_entry_info(&pack)?;
        let from = pack.status;

        pack.record_submission(SubmissionAttempt::accepted(
            method,
            confirmation_number,
            info.version,
            now,
        ))?;

        let mut mirror = MirrorBatch::new();
        let tx = self.conn.unchecked_transaction()?;
        db::save_pack(&tx, &pack)?;
        self.take_snapshot(&tx, &pack, &info, SnapshotReason::Submitted, now, &mut mirror)?;
        self.record_event(
            &tx,
            AuditEventType::StatusChanged,
            &pack.id,
            serde_json::json!({
                "from": from.as_str(),
                "to": pack.status.as_str(),
                "method": method.as_str(),
                "confirmation_number": confirmation_number,
                "entry_info_version": info.version,
            }),
            now,
            &mut mirror,
        )?;
        tx.commit()?;
        self.audit.flush(mirror);

        tracing::info!(pack_id = %pack.id, method = method.as_str(), "submission recorded");
        Ok(pack)
    }

    /// Record a failed submission attempt; the status does not change
    pub fn record_failed_submission(
        &self,
        pack_id: &str,
        method: SubmissionMethod,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryPack> {
        let mut pack = self.get_active_pack(pack_id)?;
        let info = self.current_entry_info(&pack)?;

        pack.record_submission(SubmissionAttempt::failed(method, error, info.version, now))?;
        db::save_pack(&self.conn, &pack)?;

        tracing::warn!(pack_id = %pack.id, method = method.as_str(), error, "submission attempt failed");
        Ok(pack)
    }

    pub fn cancel_submission(
        &self,
        pack_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EntryPack> {
        let mut pack = self.get_active_pack(pack_id)?;
        let info = self.current_entry_info(&pack)?;
        let cancelled = pack.current_submission.clone();

        pack.cancel_submission(reason.clone(), now)?;

        let mut mirror = MirrorBatch::new();
        let tx = self.conn.unchecked_transaction()?;
        db::save_pack(&tx, &pack)?;
        self.take_snapshot(&tx, &pack, &info, SnapshotReason::Cancelled, now, &mut mirror)?;
        self.record_event(
            &tx,
            AuditEventType::StatusChanged,
            &pack.id,
            serde_json::json!({
                "from": PackStatus::Submitted.as_str(),
                "to": pack.status.as_str(),
                "reason": reason,
                "cancelled_attempt": cancelled.map(|a| a.id),
            }),
            now,
            &mut mirror,
        )?;
        tx.commit()?;
        self.audit.flush(mirror);

        tracing::info!(pack_id = %pack.id, "submission cancelled");
        Ok(pack)
    }

    /// Status report plus a `viewed` audit event
    pub fn view_pack(&self, pack_id: &str, now: DateTime<Utc>) -> Result<PackStatusReport> {
        let pack = self.get_pack(pack_id)?;
        let report = self.status_report(&pack, now)?;

        self.record_event_now(
            AuditEventType::Viewed,
            &pack.id,
            serde_json::json!({ "status": pack.status.as_str() }),
            now,
        )?;

        Ok(report)
    }

    /// Export a pack (JSON: full record; CSV: submission history)
    pub fn export_pack(&self, pack_id: &str, path: &Path, now: DateTime<Utc>) -> Result<ExportFormat> {
        let pack = self.get_pack(pack_id)?;
        let format = ExportFormat::from_path(path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create export directory: {:?}", parent))?;
        }

        match format {
            ExportFormat::Json => {
                let document = serde_json::json!({
                    "pack": pack,
                    "entry_info_history": self.entry_info_history(pack_id)?.versions,
                    "snapshots": self.snapshots(pack_id)?,
                    "audit_events": self.history(pack_id)?,
                    "exported_at": now,
                });
                let json = serde_json::to_string_pretty(&document)?;
                fs::write(path, json).with_context(|| format!("Failed to write export: {:?}", path))?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)
                    .with_context(|| format!("Failed to create export: {:?}", path))?;
                for attempt in &pack.submission_history {
                    writer.serialize(SubmissionRow {
                        pack_id: &pack.id,
                        attempt_id: &attempt.id,
                        submitted_at: attempt.submitted_at.to_rfc3339(),
                        method: attempt.method.as_str(),
                        outcome: if attempt.is_accepted() { "accepted" } else { "failed" },
                        confirmation_number: attempt.confirmation_number.as_deref().unwrap_or(""),
                        error: attempt.error.as_deref().unwrap_or(""),
                        entry_info_version: attempt.entry_info_version,
                    })?;
                }
                writer.flush()?;
            }
        }

        self.record_event_now(
            AuditEventType::Exported,
            &pack.id,
            serde_json::json!({
                "path": path.display().to_string(),
                "format": format.as_str(),
            }),
            now,
        )?;

        tracing::info!(pack_id = %pack.id, path = ?path, "pack exported");
        Ok(format)
    }

    /// Soft-delete a pack (history, snapshots and audit trail are kept)
    pub fn delete_pack(&self, pack_id: &str, now: DateTime<Utc>) -> Result<EntryPack> {
        let mut pack = self.get_active_pack(pack_id)?;
        let info = self.current_entry_info(&pack)?;

        let mut mirror = MirrorBatch::new();
        let tx = self.conn.unchecked_transaction()?;
        self.take_snapshot(&tx, &pack, &info, SnapshotReason::Deleted, now, &mut mirror)?;
        pack.mark_deleted(now)?;
        db::save_pack(&tx, &pack)?;
        self.record_event(
            &tx,
            AuditEventType::Deleted,
            &pack.id,
            serde_json::json!({ "status": pack.status.as_str() }),
            now,
            &mut mirror,
        )?;
        tx.commit()?;
        self.audit.flush(mirror);

        tracing::info!(pack_id = %pack.id, "entry pack deleted");
        Ok(pack)
    }

    /// Apply the transition the clock makes due (complete/expire/archive), if any
    pub fn apply_due_transition(&self, pack_id: &str, now: DateTime<Utc>) -> Result<Option<PackStatus>> {
        let mut pack = self.get_active_pack(pack_id)?;
        let Some(next) = due_transition(&pack, self.archive_grace, now) else {
            return Ok(None);
        };

        let from = pack.status;
        let reason = match next {
            PackStatus::Completed => {
                pack.complete(now)?;
                SnapshotReason::Completed
            }
            PackStatus::Expired => {
                pack.expire(Some("arrival passed without submission".to_string()), now)?;
                SnapshotReason::Expired
            }
            PackStatus::Archived => {
                pack.archive(self.archive_grace, now)?;
                SnapshotReason::Archived
            }
            other => bail!("Unexpected due transition to {}", other),
        };

        let info = self.current_entry_info(&pack)?;
        let mut mirror = MirrorBatch::new();
        let tx = self.conn.unchecked_transaction()?;
        db::save_pack(&tx, &pack)?;
        self.take_snapshot(&tx, &pack, &info, reason, now, &mut mirror)?;
        self.record_event(
            &tx,
            AuditEventType::StatusChanged,
            &pack.id,
            serde_json::json!({
                "from": from.as_str(),
                "to": pack.status.as_str(),
                "automatic": true,
            }),
            now,
            &mut mirror,
        )?;
        tx.commit()?;
        self.audit.flush(mirror);

        tracing::info!(pack_id = %pack.id, from = %from, to = %pack.status, "pack transitioned");
        Ok(Some(pack.status))
    }
}

// ============================================================================
// TESTS
// ============================================================================
