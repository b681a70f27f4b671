// Entry Pack - Core Library
// Completion, arrival windows and the pack lifecycle, shared by the CLI and tests

pub mod entry;          // Traveler data: passport, personal info, funds, travel
pub mod destinations;   // Per-country requirements
pub mod completion;     // CompletionCalculator
pub mod validation;     // Field formats + submission checks
pub mod arrival;        // ArrivalWindowCalculator
pub mod lifecycle;      // EntryPack state machine
pub mod versioning;     // EntryInfo version history
pub mod snapshot;       // Immutable pack snapshots
pub mod audit;          // Audit events + JSON mirror
pub mod db;             // SQLite store
pub mod progress;       // Debounced saves
pub mod config;
pub mod service;
pub mod archival;

// Re-export commonly used types
pub use entry::{
    EntryInfo, Passport, PersonalInfo, FundItem, FundType, TravelInfo, PhotoRef,
};
pub use destinations::{
    Destination, DestinationRegistry, PersonalField, TravelField,
};
pub use completion::{
    Category, CategoryMetrics, CategoryState, CategoryWeights,
    CompletionCalculator, CompletionMetrics, CompletionState,
    compute_completion,
};
pub use validation::{
    ValidationContext, ValidationError, ValidationResult, validate_entry_info,
};
pub use arrival::{
    ArrivalWindow, ArrivalWindowCalculator, Countdown, SubmissionReadiness, WindowState,
    arrival_instant, assess_readiness, compute_arrival_window,
};
pub use lifecycle::{
    EntryPack, PackStatus, LifecycleError, SubmissionAttempt, SubmissionMethod,
    AttemptOutcome, StatusTransition, DisplayStatus,
    display_status, due_transition, should_archive,
};
pub use versioning::{VersionedValue, TemporalEntity};
pub use snapshot::{EntryPackSnapshot, SnapshotReason, PhotoManifestEntry};
pub use audit::{AuditEvent, AuditEventType, AuditLog, MirrorBatch, MirrorReport};
pub use progress::{DebouncedSaver, FormProgress, ProgressDelta};
pub use config::Config;
pub use service::{EntryPackService, ExportFormat, PackStatusReport};
pub use archival::{ArchivalJob, ArchivalReport, ArchivalFailure};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
