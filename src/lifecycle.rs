// 🔁 Entry Pack Lifecycle
//
// in_progress → submitted → completed | expired → archived
//
// Also: in_progress → expired (arrival passed with nothing submitted),
// submitted → in_progress (cancellation), submitted → submitted
// (resubmission). Submission attempts and status transitions are append-only.

use crate::arrival::ArrivalWindow;
use crate::completion::{CompletionMetrics, CompletionState};
use crate::entry::EntryInfo;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Packs are archived this long after arrival
pub const DEFAULT_ARCHIVE_GRACE_HOURS: i64 = 24;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackStatus {
    InProgress,
    Submitted,
    Completed,
    Expired,
    Archived,
}

impl PackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackStatus::InProgress => "in_progress",
            PackStatus::Submitted => "submitted",
            PackStatus::Completed => "completed",
            PackStatus::Expired => "expired",
            PackStatus::Archived => "archived",
        }
    }

    /// No further submissions possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PackStatus::Completed | PackStatus::Expired | PackStatus::Archived
        )
    }

    pub fn can_transition_to(&self, next: PackStatus) -> bool {
        use PackStatus::*;
        matches!(
            (self, next),
            (InProgress, Submitted)
                | (InProgress, Expired)
                | (Submitted, Submitted)
                | (Submitted, InProgress)
                | (Submitted, Completed)
                | (Submitted, Expired)
                | (Completed, Archived)
                | (Expired, Archived)
        )
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(PackStatus::InProgress),
            "submitted" => Ok(PackStatus::Submitted),
            "completed" => Ok(PackStatus::Completed),
            "expired" => Ok(PackStatus::Expired),
            "archived" => Ok(PackStatus::Archived),
            other => Err(LifecycleError::UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleError {
    InvalidTransition { from: PackStatus, to: PackStatus },
    NotDueForArchive { pack_id: String },
    ArrivalPassed { pack_id: String },
    Deleted { pack_id: String },
    UnknownStatus(String),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidTransition { from, to } => {
                write!(f, "Invalid transition: {} -> {}", from, to)
            }
            LifecycleError::NotDueForArchive { pack_id } => {
                write!(f, "Pack {} is not due for archival", pack_id)
            }
            LifecycleError::ArrivalPassed { pack_id } => {
                write!(f, "Pack {} can no longer be submitted: arrival has passed", pack_id)
            }
            LifecycleError::Deleted { pack_id } => write!(f, "Pack {} was deleted", pack_id),
            LifecycleError::UnknownStatus(s) => write!(f, "Unknown pack status: {}", s),
        }
    }
}

impl std::error::Error for LifecycleError {}

// ============================================================================
// SUBMISSION ATTEMPTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMethod {
    Api,
    WebView,
    Manual,
}

impl SubmissionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMethod::Api => "api",
            SubmissionMethod::WebView => "webview",
            SubmissionMethod::Manual => "manual",
        }
    }
}

impl FromStr for SubmissionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(SubmissionMethod::Api),
            "webview" => Ok(SubmissionMethod::WebView),
            "manual" => Ok(SubmissionMethod::Manual),
            other => Err(format!("Unknown submission method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Failed,
}

/// One submission to a government portal (never edited once recorded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub method: SubmissionMethod,
    pub outcome: AttemptOutcome,
    pub confirmation_number: Option<String>,
    pub error: Option<String>,
    /// EntryInfo version that was submitted
    pub entry_info_version: i64,
}

impl SubmissionAttempt {
    pub fn accepted(
        method: SubmissionMethod,
        confirmation_number: &str,
        entry_info_version: i64,
        now: DateTime<Utc>,
    ) -> Self {
        SubmissionAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            submitted_at: now,
            method,
            outcome: AttemptOutcome::Accepted,
            confirmation_number: Some(confirmation_number.to_string()),
            error: None,
            entry_info_version,
        }
    }

    pub fn failed(
        method: SubmissionMethod,
        error: &str,
        entry_info_version: i64,
        now: DateTime<Utc>,
    ) -> Self {
        SubmissionAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            submitted_at: now,
            method,
            outcome: AttemptOutcome::Failed,
            confirmation_number: None,
            error: Some(error.to_string()),
            entry_info_version,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == AttemptOutcome::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: PackStatus,
    pub to: PackStatus,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

// ============================================================================
// ENTRY PACK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPack {
    pub id: String,
    pub entry_info_id: String,
    pub traveler_id: String,
    pub destination: String,
    pub status: PackStatus,
    pub arrival_at: Option<DateTime<Utc>>,

    /// Latest accepted submission (cleared on cancellation)
    pub current_submission: Option<SubmissionAttempt>,
    /// Every attempt, accepted or not (append-only)
    pub submission_history: Vec<SubmissionAttempt>,
    /// Every status change (append-only)
    pub transitions: Vec<StatusTransition>,

    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntryPack {
    pub fn new(info: &EntryInfo, arrival_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        EntryPack {
            id: uuid::Uuid::new_v4().to_string(),
            entry_info_id: info.id.clone(),
            traveler_id: info.traveler_id.clone(),
            destination: info.destination.clone(),
            status: PackStatus::InProgress,
            arrival_at,
            current_submission: None,
            submission_history: Vec::new(),
            transitions: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
            archived_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn ensure_active(&self) -> Result<(), LifecycleError> {
        if self.is_deleted() {
            return Err(LifecycleError::Deleted {
                pack_id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        to: PackStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_active()?;

        if !self.status.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason,
        });
        self.status = to;
        self.version += 1;
        self.updated_at = now;

        Ok(())
    }

    /// Record a submission attempt
    ///
    /// Accepted attempts move the pack to `Submitted` (also from `Submitted`,
    /// for resubmissions). Failed attempts are only appended to history.
    /// Nothing is accepted at or after arrival; the pack is due to expire.
    pub fn record_submission(&mut self, attempt: SubmissionAttempt) -> Result<(), LifecycleError> {
        self.ensure_active()?;

        if !matches!(self.status, PackStatus::InProgress | PackStatus::Submitted) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: PackStatus::Submitted,
            });
        }

        if attempt.is_accepted()
            && self.arrival_at.map_or(false, |arrival| attempt.submitted_at >= arrival)
        {
            return Err(LifecycleError::ArrivalPassed {
                pack_id: self.id.clone(),
            });
        }

        let now = attempt.submitted_at;
        self.submission_history.push(attempt.clone());

        if attempt.is_accepted() {
            let reason = attempt
                .confirmation_number
                .as_ref()
                .map(|c| format!("accepted: {}", c));
            self.current_submission = Some(attempt);
            self.transition(PackStatus::Submitted, reason, now)?;
        } else {
            self.version += 1;
            self.updated_at = now;
        }

        Ok(())
    }

    /// Cancel the current submission; the pack goes back to in-progress
    pub fn cancel_submission(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(PackStatus::InProgress, reason, now)?;
        self.current_submission = None;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(PackStatus::Completed, Some("arrived".to_string()), now)
    }

    pub fn expire(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(PackStatus::Expired, reason, now)
    }

    pub fn archive(&mut self, grace: Duration, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if !should_archive(self, grace, now) {
            return Err(LifecycleError::NotDueForArchive {
                pack_id: self.id.clone(),
            });
        }

        self.transition(PackStatus::Archived, Some("arrival + grace elapsed".to_string()), now)?;
        self.archived_at = Some(now);
        Ok(())
    }

    /// Arrival changed (traveler edited the date/time)
    pub fn update_arrival(
        &mut self,
        arrival_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.ensure_active()?;
        if self.arrival_at != arrival_at {
            self.arrival_at = arrival_at;
            self.version += 1;
            self.updated_at = now;
        }
        Ok(())
    }

    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_active()?;
        self.deleted_at = Some(now);
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn attempt_count(&self) -> usize {
        self.submission_history.len()
    }
}

// ============================================================================
// ARCHIVAL RULES
// ============================================================================

/// A pack is archived once it is completed/expired and arrival + grace has passed
pub fn should_archive(pack: &EntryPack, grace: Duration, now: DateTime<Utc>) -> bool {
    if pack.is_deleted() {
        return false;
    }
    if !matches!(pack.status, PackStatus::Completed | PackStatus::Expired) {
        return false;
    }

    pack.arrival_at
        .and_then(|arrival| arrival.checked_add_signed(grace))
        .map_or(false, |due| now >= due)
}

/// Next status the background job should move this pack to, if any
pub fn due_transition(pack: &EntryPack, grace: Duration, now: DateTime<Utc>) -> Option<PackStatus> {
    if pack.is_deleted() {
        return None;
    }
    let arrival = pack.arrival_at?;

    match pack.status {
        PackStatus::Submitted if now >= arrival => Some(PackStatus::Completed),
        PackStatus::InProgress if now >= arrival => Some(PackStatus::Expired),
        PackStatus::Completed | PackStatus::Expired if should_archive(pack, grace, now) => {
            Some(PackStatus::Archived)
        }
        _ => None,
    }
}

// ============================================================================
// DISPLAY STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    NotStarted,
    InProgress,
    ReadyToSubmit,
    Submitted,
    Completed,
    Expired,
    Archived,
}

impl DisplayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::NotStarted => "Not started",
            DisplayStatus::InProgress => "In progress",
            DisplayStatus::ReadyToSubmit => "Ready to submit",
            DisplayStatus::Submitted => "Submitted",
            DisplayStatus::Completed => "Completed",
            DisplayStatus::Expired => "Expired",
            DisplayStatus::Archived => "Archived",
        }
    }
}

pub fn display_status(
    pack: &EntryPack,
    completion: &CompletionMetrics,
    window: &ArrivalWindow,
) -> DisplayStatus {
    match pack.status {
        PackStatus::Archived => DisplayStatus::Archived,
        PackStatus::Completed => DisplayStatus::Completed,
        PackStatus::Expired => DisplayStatus::Expired,
        PackStatus::Submitted => DisplayStatus::Submitted,
        PackStatus::InProgress => match completion.state {
            CompletionState::NotStarted => DisplayStatus::NotStarted,
            CompletionState::Complete if window.state.is_open() => DisplayStatus::ReadyToSubmit,
            _ => DisplayStatus::InProgress,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::compute_arrival_window;
    use crate::completion::compute_completion;
    use crate::completion::tests::complete_thailand_entry;
    use crate::destinations::DestinationRegistry;
    use chrono::TimeZone;

    fn t(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 11, d, h, 0, 0).unwrap()
    }

    fn grace() -> Duration {
        Duration::hours(DEFAULT_ARCHIVE_GRACE_HOURS)
    }

    fn new_pack() -> EntryPack {
        let info = EntryInfo::new("traveler-1", "TH");
        EntryPack::new(&info, Some(t(10, 0)), t(1, 0))
    }

    #[test]
    fn test_status_round_trip_and_unknown() {
        for s in [
            PackStatus::InProgress,
            PackStatus::Submitted,
            PackStatus::Completed,
            PackStatus::Expired,
            PackStatus::Archived,
        ] {
            assert_eq!(s.as_str().parse::<PackStatus>().unwrap(), s);
        }
        assert!("deleted".parse::<PackStatus>().is_err());
    }

    #[test]
    fn test_submit_and_complete() {
        let mut pack = new_pack();

        pack.record_submission(SubmissionAttempt::accepted(
            SubmissionMethod::Api,
            "TDAC-001",
            1,
            t(8, 0),
        ))
        .unwrap();

        assert_eq!(pack.status, PackStatus::Submitted);
        assert_eq!(pack.version, 2);
        assert_eq!(
            pack.current_submission.as_ref().unwrap().confirmation_number.as_deref(),
            Some("TDAC-001")
        );

        pack.complete(t(10, 0)).unwrap();
        assert_eq!(pack.status, PackStatus::Completed);
        assert_eq!(pack.transitions.len(), 2);
        assert_eq!(pack.transitions[1].from, PackStatus::Submitted);
    }

    #[test]
    fn test_failed_attempt_keeps_status() {
        let mut pack = new_pack();

        pack.record_submission(SubmissionAttempt::failed(
            SubmissionMethod::WebView,
            "captcha timeout",
            1,
            t(8, 0),
        ))
        .unwrap();

        assert_eq!(pack.status, PackStatus::InProgress);
        assert_eq!(pack.attempt_count(), 1);
        assert!(pack.current_submission.is_none());
        assert!(pack.transitions.is_empty());
    }

    #[test]
    fn test_resubmission_appends_history() {
        let mut pack = new_pack();
        pack.record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "A", 1, t(8, 0)))
            .unwrap();
        pack.record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "B", 2, t(8, 6)))
            .unwrap();

        assert_eq!(pack.status, PackStatus::Submitted);
        assert_eq!(pack.attempt_count(), 2);
        assert_eq!(pack.submission_history[0].confirmation_number.as_deref(), Some("A"));
        assert_eq!(
            pack.current_submission.as_ref().unwrap().confirmation_number.as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_cancel_returns_to_in_progress() {
        let mut pack = new_pack();
        pack.record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "A", 1, t(8, 0)))
            .unwrap();

        pack.cancel_submission(Some("wrong flight".to_string()), t(8, 1))
            .unwrap();

        assert_eq!(pack.status, PackStatus::InProgress);
        assert!(pack.current_submission.is_none());
        assert_eq!(pack.attempt_count(), 1);

        // Nothing to cancel now
        let err = pack.cancel_submission(None, t(8, 2)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: PackStatus::InProgress,
                to: PackStatus::InProgress
            }
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut pack = new_pack();
        assert!(pack.complete(t(10, 0)).is_err());

        pack.expire(None, t(10, 0)).unwrap();
        let err = pack
            .record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "A", 1, t(10, 1)))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert!(err.to_string().contains("expired -> submitted"));
    }

    #[test]
    fn test_should_archive() {
        let mut pack = new_pack();

        // Not completed/expired
        assert!(!should_archive(&pack, grace(), t(20, 0)));

        pack.expire(None, t(10, 0)).unwrap();
        assert!(!should_archive(&pack, grace(), t(10, 23)));
        assert!(should_archive(&pack, grace(), t(11, 0)));

        assert!(pack.archive(grace(), t(10, 23)).is_err());
        pack.archive(grace(), t(11, 0)).unwrap();
        assert_eq!(pack.status, PackStatus::Archived);
        assert_eq!(pack.archived_at, Some(t(11, 0)));

        // Already archived
        assert!(!should_archive(&pack, grace(), t(12, 0)));
    }

    #[test]
    fn test_submission_after_arrival_rejected() {
        let mut pack = new_pack();

        let err = pack
            .record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "LATE", 1, t(10, 0)))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ArrivalPassed { .. }));
        assert_eq!(pack.status, PackStatus::InProgress);
        assert_eq!(pack.attempt_count(), 0);
        assert_eq!(due_transition(&pack, grace(), t(10, 1)), Some(PackStatus::Expired));

        // A failed attempt is still recorded
        pack.record_submission(SubmissionAttempt::failed(SubmissionMethod::Api, "closed", 1, t(10, 1)))
            .unwrap();
        assert_eq!(pack.attempt_count(), 1);
    }

    #[test]
    fn test_huge_grace_does_not_overflow() {
        let mut pack = new_pack();
        pack.expire(None, t(10, 0)).unwrap();

        assert!(!should_archive(&pack, Duration::days(100_000_000), t(30, 0)));
        assert_eq!(due_transition(&pack, Duration::days(100_000_000), t(30, 0)), None);
    }

    #[test]
    fn test_no_arrival_never_archives() {
        let info = EntryInfo::new("traveler-1", "TH");
        let mut pack = EntryPack::new(&info, None, t(1, 0));
        pack.expire(Some("abandoned".to_string()), t(2, 0)).unwrap();

        assert!(!should_archive(&pack, grace(), t(30, 0)));
        assert_eq!(due_transition(&pack, grace(), t(30, 0)), None);
    }

    #[test]
    fn test_due_transition() {
        let mut pack = new_pack();
        assert_eq!(due_transition(&pack, grace(), t(9, 0)), None);
        assert_eq!(due_transition(&pack, grace(), t(10, 0)), Some(PackStatus::Expired));

        pack.record_submission(SubmissionAttempt::accepted(SubmissionMethod::Api, "A", 1, t(8, 0)))
            .unwrap();
        assert_eq!(due_transition(&pack, grace(), t(10, 0)), Some(PackStatus::Completed));

        pack.complete(t(10, 0)).unwrap();
        assert_eq!(due_transition(&pack, grace(), t(10, 12)), None);
        assert_eq!(due_transition(&pack, grace(), t(11, 0)), Some(PackStatus::Archived));
    }

    #[test]
    fn test_deleted_pack_rejects_changes() {
        let mut pack = new_pack();
        pack.mark_deleted(t(2, 0)).unwrap();

        assert!(matches!(
            pack.expire(None, t(10, 0)),
            Err(LifecycleError::Deleted { .. })
        ));
        assert_eq!(due_transition(&pack, grace(), t(20, 0)), None);
    }

    #[test]
    fn test_display_status() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let info = complete_thailand_entry();
        let completion = compute_completion(&info, th);
        let arrival = crate::arrival::arrival_instant(&info.travel, th);
        let mut pack = EntryPack::new(&info, arrival, t(1, 0));

        let early = compute_arrival_window(arrival, th, Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap());
        assert_eq!(display_status(&pack, &completion, &early), DisplayStatus::InProgress);

        let open = compute_arrival_window(arrival, th, Utc.with_ymd_and_hms(2026, 10, 31, 0, 0, 0).unwrap());
        assert_eq!(display_status(&pack, &completion, &open), DisplayStatus::ReadyToSubmit);

        let empty = compute_completion(&EntryInfo::new("traveler-1", "TH"), th);
        assert_eq!(display_status(&pack, &empty, &open), DisplayStatus::NotStarted);

        pack.record_submission(SubmissionAttempt::accepted(
            SubmissionMethod::Manual,
            "X",
            1,
            Utc.with_ymd_and_hms(2026, 10, 31, 0, 0, 0).unwrap(),
        ))
        .unwrap();
        assert_eq!(display_status(&pack, &completion, &open), DisplayStatus::Submitted);
        assert_eq!(DisplayStatus::Submitted.label(), "Submitted");
    }
}
