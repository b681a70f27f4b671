// ⏳ Arrival Window Calculator
//
// Maps the traveler's arrival (destination-local date + time) and "now" to a
// submission window state and countdown. Destinations without a window are
// open until arrival.

use crate::completion::CompletionMetrics;
use crate::config::MAX_HOURS;
use crate::destinations::Destination;
use crate::entry::TravelInfo;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default threshold below which an open window is flagged urgent
pub const DEFAULT_URGENT_HOURS: i64 = 24;

// ============================================================================
// COUNTDOWN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl Countdown {
    /// Break a duration into days/hours/minutes (negative durations clamp to zero)
    pub fn from_duration(duration: Duration) -> Self {
        let total_minutes = duration.num_minutes().max(0);
        Countdown {
            days: total_minutes / (24 * 60),
            hours: (total_minutes / 60) % 24,
            minutes: total_minutes % 60,
        }
    }

    pub fn total_minutes(&self) -> i64 {
        self.days * 24 * 60 + self.hours * 60 + self.minutes
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days > 0 {
            write!(f, "{}d {}h {}m", self.days, self.hours, self.minutes)
        } else if self.hours > 0 {
            write!(f, "{}h {}m", self.hours, self.minutes)
        } else {
            write!(f, "{}m", self.minutes)
        }
    }
}

// ============================================================================
// WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    /// No arrival date entered yet
    NoArrivalDate,
    /// Submission not yet accepted by the destination
    NotYetOpen,
    Open,
    /// Open, but arrival is within the urgent threshold
    Urgent,
    /// Arrival time has passed
    Closed,
}

impl WindowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowState::NoArrivalDate => "no_arrival_date",
            WindowState::NotYetOpen => "not_yet_open",
            WindowState::Open => "open",
            WindowState::Urgent => "urgent",
            WindowState::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, WindowState::Open | WindowState::Urgent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalWindow {
    pub state: WindowState,
    pub arrival_at: Option<DateTime<Utc>>,
    /// When the destination starts accepting submissions (None = no window)
    pub opens_at: Option<DateTime<Utc>>,
    /// Time until the window opens (NotYetOpen) or until arrival (Open/Urgent)
    pub countdown: Option<Countdown>,
}

impl ArrivalWindow {
    pub fn describe(&self) -> String {
        match (self.state, self.countdown) {
            (WindowState::NotYetOpen, Some(c)) => format!("opens in {}", c),
            (WindowState::Open, Some(c)) => format!("open, arrival in {}", c),
            (WindowState::Urgent, Some(c)) => format!("urgent, arrival in {}", c),
            (WindowState::Closed, _) => "closed".to_string(),
            (WindowState::NoArrivalDate, _) => "no arrival date".to_string(),
            (state, None) => state.as_str().to_string(),
        }
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

/// Arrival instant in UTC, from destination-local date and time
pub fn arrival_instant(travel: &TravelInfo, destination: &Destination) -> Option<DateTime<Utc>> {
    let date = travel.arrival_date?;
    let local = match travel.arrival_time {
        Some(time) => date.and_time(time),
        None => date.and_hms_opt(0, 0, 0)?,
    };

    destination
        .offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct ArrivalWindowCalculator {
    urgent_threshold: Duration,
}

impl ArrivalWindowCalculator {
    pub fn new() -> Self {
        ArrivalWindowCalculator {
            urgent_threshold: Duration::hours(DEFAULT_URGENT_HOURS),
        }
    }

    /// Threshold in hours, clamped to 0..=MAX_HOURS
    pub fn with_urgent_hours(hours: i64) -> Self {
        ArrivalWindowCalculator {
            urgent_threshold: Duration::hours(hours.clamp(0, MAX_HOURS)),
        }
    }

    /// Compute the window for an arrival instant
    pub fn compute(
        &self,
        arrival_at: Option<DateTime<Utc>>,
        destination: &Destination,
        now: DateTime<Utc>,
    ) -> ArrivalWindow {
        let Some(arrival_at) = arrival_at else {
            return ArrivalWindow {
                state: WindowState::NoArrivalDate,
                arrival_at: None,
                opens_at: None,
                countdown: None,
            };
        };

        let opens_at = destination
            .submission_window_hours
            .and_then(|hours| {
                arrival_at.checked_sub_signed(Duration::hours(hours.clamp(0, MAX_HOURS)))
            });

        if now >= arrival_at {
            return ArrivalWindow {
                state: WindowState::Closed,
                arrival_at: Some(arrival_at),
                opens_at,
                countdown: None,
            };
        }

        if let Some(opens) = opens_at {
            if now < opens {
                return ArrivalWindow {
                    state: WindowState::NotYetOpen,
                    arrival_at: Some(arrival_at),
                    opens_at,
                    countdown: Some(Countdown::from_duration(opens - now)),
                };
            }
        }

        let remaining = arrival_at - now;
        let state = if remaining <= self.urgent_threshold {
            WindowState::Urgent
        } else {
            WindowState::Open
        };

        ArrivalWindow {
            state,
            arrival_at: Some(arrival_at),
            opens_at,
            countdown: Some(Countdown::from_duration(remaining)),
        }
    }

}

impl Default for ArrivalWindowCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Window with the default urgent threshold
pub fn compute_arrival_window(
    arrival_at: Option<DateTime<Utc>>,
    destination: &Destination,
    now: DateTime<Utc>,
) -> ArrivalWindow {
    ArrivalWindowCalculator::new().compute(arrival_at, destination, now)
}

// ============================================================================
// SUBMISSION READINESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SubmissionReadiness {
    /// Required data still missing
    Incomplete { missing: Vec<String> },
    /// Data complete, waiting for the destination to accept submissions
    WaitingForWindow { opens_at: DateTime<Utc> },
    Ready,
    ReadyUrgent,
    AlreadySubmitted,
    /// Arrival passed without a submission
    TooLate,
    /// Pack is completed, expired or archived
    Closed,
}

impl SubmissionReadiness {
    pub fn can_submit(&self) -> bool {
        matches!(
            self,
            SubmissionReadiness::Ready | SubmissionReadiness::ReadyUrgent
        )
    }
}

/// Decide whether the traveler can submit now
///
/// `submitted` and `terminal` come from the pack's lifecycle status.
pub fn assess_readiness(
    completion: &CompletionMetrics,
    window: &ArrivalWindow,
    submitted: bool,
    terminal: bool,
) -> SubmissionReadiness {
    if terminal {
        return SubmissionReadiness::Closed;
    }
    if submitted {
        return SubmissionReadiness::AlreadySubmitted;
    }
    if window.state == WindowState::Closed {
        return SubmissionReadiness::TooLate;
    }
    if !completion.is_complete() {
        return SubmissionReadiness::Incomplete {
            missing: completion.missing_fields(),
        };
    }

    match window.state {
        WindowState::NotYetOpen => match window.opens_at {
            Some(opens_at) => SubmissionReadiness::WaitingForWindow { opens_at },
            None => SubmissionReadiness::Ready,
        },
        WindowState::Urgent => SubmissionReadiness::ReadyUrgent,
        // Complete data implies an arrival date, so NoArrivalDate is unreachable
        // unless a destination does not require one.
        WindowState::Open | WindowState::NoArrivalDate => SubmissionReadiness::Ready,
        WindowState::Closed => SubmissionReadiness::TooLate,
    }
}

// ============================================================================
// TESTS
// ============================================================================
