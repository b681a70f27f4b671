// 📸 Entry Pack Snapshots - Immutable copies for audit/history
//
// Taken at submission, cancellation, expiry, completion and archival. A
// snapshot carries a full copy of the pack and entry info, a manifest of the
// photos referenced at that moment, and a content hash so tampering is
// detectable. Snapshots are never modified after creation.

use crate::entry::EntryInfo;
use crate::lifecycle::EntryPack;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    Submitted,
    Cancelled,
    Completed,
    Expired,
    Archived,
    Deleted,
    Manual,
}

impl SnapshotReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotReason::Submitted => "submitted",
            SnapshotReason::Cancelled => "cancelled",
            SnapshotReason::Completed => "completed",
            SnapshotReason::Expired => "expired",
            SnapshotReason::Archived => "archived",
            SnapshotReason::Deleted => "deleted",
            SnapshotReason::Manual => "manual",
        }
    }
}

impl fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(SnapshotReason::Submitted),
            "cancelled" => Ok(SnapshotReason::Cancelled),
            "completed" => Ok(SnapshotReason::Completed),
            "expired" => Ok(SnapshotReason::Expired),
            "archived" => Ok(SnapshotReason::Archived),
            "deleted" => Ok(SnapshotReason::Deleted),
            "manual" => Ok(SnapshotReason::Manual),
            other => Err(format!("Unknown snapshot reason: {}", other)),
        }
    }
}

// ============================================================================
// PHOTO MANIFEST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoManifestEntry {
    /// Field the photo belongs to (e.g., "passport", "funds[0]")
    pub source: String,
    pub uri: String,
    /// Whether the file was readable when the snapshot was taken
    pub present: bool,
    pub size_bytes: Option<u64>,
    pub sha256: Option<String>,
}

/// Strip a file:// scheme so local URIs can be read from disk
fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

/// Hash every photo the entry references; missing files are recorded, not fatal
pub fn build_photo_manifest(info: &EntryInfo) -> Vec<PhotoManifestEntry> {
    info.photo_refs()
        .into_iter()
        .map(|photo| match fs::read(local_path(&photo.uri)) {
            Ok(bytes) => PhotoManifestEntry {
                source: photo.source,
                uri: photo.uri,
                present: true,
                size_bytes: Some(bytes.len() as u64),
                sha256: Some(format!("{:x}", Sha256::digest(&bytes))),
            },
            Err(e) => {
                tracing::debug!(uri = %photo.uri, error = %e, "photo not readable for manifest");
                PhotoManifestEntry {
                    source: photo.source,
                    uri: photo.uri,
                    present: false,
                    size_bytes: None,
                    sha256: None,
                }
            }
        })
        .collect()
}

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPackSnapshot {
    pub id: String,
    pub pack_id: String,
    pub reason: SnapshotReason,
    pub created_at: DateTime<Utc>,
    pub created_by: String,

    /// Full copies at snapshot time
    pub pack: EntryPack,
    pub entry_info: EntryInfo,

    pub completion_percent: u8,
    pub photo_manifest: Vec<PhotoManifestEntry>,

    /// SHA-256 over the serialized pack + entry info
    pub content_hash: String,

    /// Extra audit data (app version, entry info version...)
    pub metadata: serde_json::Value,
}

/// Hash of the data a snapshot protects
pub fn compute_content_hash(pack: &EntryPack, info: &EntryInfo) -> Result<String> {
    let pack_json = serde_json::to_vec(pack).context("Failed to serialize pack for hashing")?;
    let info_json = serde_json::to_vec(info).context("Failed to serialize entry info for hashing")?;

    let mut hasher = Sha256::new();
    hasher.update(&pack_json);
    hasher.update(b"\n");
    hasher.update(&info_json);
    Ok(format!("{:x}", hasher.finalize()))
}

impl EntryPackSnapshot {
    pub fn capture(
        pack: &EntryPack,
        info: &EntryInfo,
        reason: SnapshotReason,
        created_by: &str,
        completion_percent: u8,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let content_hash = compute_content_hash(pack, info)?;

        Ok(EntryPackSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            pack_id: pack.id.clone(),
            reason,
            created_at: now,
            created_by: created_by.to_string(),
            pack: pack.clone(),
            entry_info: info.clone(),
            completion_percent,
            photo_manifest: build_photo_manifest(info),
            content_hash,
            metadata,
        })
    }

    /// Recompute the content hash and compare
    pub fn verify(&self) -> Result<bool> {
        Ok(compute_content_hash(&self.pack, &self.entry_info)? == self.content_hash)
    }

    pub fn missing_photos(&self) -> Vec<&PhotoManifestEntry> {
        self.photo_manifest.iter().filter(|p| !p.present).collect()
    }

    /// Write the snapshot as pretty JSON (used for the file mirror)
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        fs::write(path, json).with_context(|| format!("Failed to write snapshot: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{FundItem, FundType};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 11, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_capture_and_verify() {
        let info = EntryInfo::new("traveler-1", "TH");
        let pack = EntryPack::new(&info, None, now());

        let snapshot = EntryPackSnapshot::capture(
            &pack,
            &info,
            SnapshotReason::Manual,
            "tester",
            0,
            serde_json::json!({"note": "baseline"}),
            now(),
        )
        .unwrap();

        assert_eq!(snapshot.pack_id, pack.id);
        assert_eq!(snapshot.content_hash.len(), 64);
        assert!(snapshot.verify().unwrap());
    }

    #[test]
    fn test_tampering_detected() {
        let info = EntryInfo::new("traveler-1", "TH");
        let pack = EntryPack::new(&info, None, now());

        let mut snapshot = EntryPackSnapshot::capture(
            &pack,
            &info,
            SnapshotReason::Submitted,
            "tester",
            100,
            serde_json::Value::Null,
            now(),
        )
        .unwrap();

        snapshot.entry_info.passport.passport_number = Some("FORGED".to_string());
        assert!(!snapshot.verify().unwrap());
    }

    #[test]
    fn test_photo_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let photo_path = dir.path().join("passport.jpg");
        fs::write(&photo_path, b"fake jpeg bytes").unwrap();

        let mut info = EntryInfo::new("traveler-1", "TH");
        info.passport.photo_uri = Some(format!("file://{}", photo_path.display()));
        let mut card = FundItem::new(FundType::BankCard, None, None);
        card.photo_uri = Some(dir.path().join("missing.jpg").display().to_string());
        info.funds.push(card);

        let manifest = build_photo_manifest(&info);
        assert_eq!(manifest.len(), 2);

        assert!(manifest[0].present);
        assert_eq!(manifest[0].size_bytes, Some(15));
        assert_eq!(
            manifest[0].sha256.as_deref(),
            Some(format!("{:x}", Sha256::digest(b"fake jpeg bytes")).as_str())
        );

        assert!(!manifest[1].present);
        assert_eq!(manifest[1].source, "funds[0]");

        let pack = EntryPack::new(&info, None, now());
        let snapshot = EntryPackSnapshot::capture(
            &pack,
            &info,
            SnapshotReason::Submitted,
            "tester",
            40,
            serde_json::Value::Null,
            now(),
        )
        .unwrap();
        let missing: Vec<&str> = snapshot
            .missing_photos()
            .iter()
            .map(|p| p.source.as_str())
            .collect();
        assert_eq!(missing, vec!["funds[0]"]);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let info = EntryInfo::new("traveler-1", "TH");
        let pack = EntryPack::new(&info, None, now());
        let snapshot = EntryPackSnapshot::capture(
            &pack,
            &info,
            SnapshotReason::Expired,
            "system",
            0,
            serde_json::Value::Null,
            now(),
        )
        .unwrap();

        let path = dir.path().join("snapshots").join(&pack.id).join("s.json");
        snapshot.write_json(&path).unwrap();

        let restored: EntryPackSnapshot =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored, snapshot);
        assert!(restored.verify().unwrap());
    }
}
