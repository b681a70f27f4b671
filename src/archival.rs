// 🗃️ Archival Job - time-driven transitions
//
// Submitted packs complete at arrival, unsubmitted ones expire at arrival, and
// both are archived once arrival + grace has passed. A late sweep may walk a
// pack through two transitions in one run.

use crate::db;
use crate::lifecycle::PackStatus;
use crate::service::EntryPackService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upper bound on transitions per pack per sweep (in_progress → expired → archived)
const MAX_STEPS_PER_PACK: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArchivalFailure {
    pub pack_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArchivalReport {
    pub scanned: usize,
    pub completed: usize,
    pub expired: usize,
    pub archived: usize,
    pub failures: Vec<ArchivalFailure>,
}

impl ArchivalReport {
    pub fn transitions(&self) -> usize {
        self.completed + self.expired + self.archived
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn count(&mut self, status: PackStatus) {
        match status {
            PackStatus::Completed => self.completed += 1,
            PackStatus::Expired => self.expired += 1,
            PackStatus::Archived => self.archived += 1,
            PackStatus::InProgress | PackStatus::Submitted => {}
        }
    }
}

pub struct ArchivalJob<'a> {
    service: &'a EntryPackService,
}

impl<'a> ArchivalJob<'a> {
    pub fn new(service: &'a EntryPackService) -> Self {
        ArchivalJob { service }
    }

    /// One sweep over every pack that is neither archived nor deleted
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<ArchivalReport> {
        let packs = db::list_active_packs(self.service.connection())?;
        let mut report = ArchivalReport {
            scanned: packs.len(),
            ..Default::default()
        };

        for pack in &packs {
            if let Err(e) = self.advance(&pack.id, now, &mut report) {
                tracing::error!(pack_id = %pack.id, error = %e, "archival failed for pack");
                report.failures.push(ArchivalFailure {
                    pack_id: pack.id.clone(),
                    error: e.to_string(),
                });
            }
        }

        tracing::info!(
            scanned = report.scanned,
            completed = report.completed,
            expired = report.expired,
            archived = report.archived,
            failures = report.failures.len(),
            "archival sweep finished"
        );

        Ok(report)
    }

    fn advance(&self, pack_id: &str, now: DateTime<Utc>, report: &mut ArchivalReport) -> Result<()> {
        for _ in 0..MAX_STEPS_PER_PACK {
            match self.service.apply_due_transition(pack_id, now)? {
                Some(status) => report.count(status),
                None => break,
            }
        }
        Ok(())
    }
}
