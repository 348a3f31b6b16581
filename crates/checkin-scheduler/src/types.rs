use checkin_core::{CheckinError, CheckinWindow, FlightLeg, LegDeparture, TriggerPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a persisted trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Waiting for its fire instant.
    Pending,
    /// Claimed by the dispatcher; the executor is working on it.
    Running,
    /// Check-in committed.
    Completed,
    /// The race or the commit failed; `last_error` says why.
    Failed,
    /// The check-in instant passed while nothing was running.
    Missed,
}

impl std::fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerStatus::Pending => "pending",
            TriggerStatus::Running => "running",
            TriggerStatus::Completed => "completed",
            TriggerStatus::Failed => "failed",
            TriggerStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TriggerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TriggerStatus::Pending),
            "running" => Ok(TriggerStatus::Running),
            "completed" => Ok(TriggerStatus::Completed),
            "failed" => Ok(TriggerStatus::Failed),
            "missed" => Ok(TriggerStatus::Missed),
            other => Err(format!("unknown trigger status: {other}")),
        }
    }
}

/// A persisted, deterministically keyed wake-up for one flight leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// `{namespace}{user_id}-{digest}`; primary key and dedup key.
    pub key: String,
    pub user_id: String,
    /// Boot instant: when the dispatcher hands the trigger to the executor.
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
    pub status: TriggerStatus,
    pub last_error: Option<String>,
    /// ISO-8601 timestamp of trigger creation.
    pub created_at: String,
    /// ISO-8601 timestamp of the last status change.
    pub updated_at: String,
}

impl Trigger {
    pub fn new(
        key: String,
        user_id: &str,
        fire_at: DateTime<Utc>,
        payload: TriggerPayload,
        now: DateTime<Utc>,
    ) -> Self {
        let now_str = now.to_rfc3339();
        Self {
            key,
            user_id: user_id.to_string(),
            fire_at,
            payload,
            status: TriggerStatus::Pending,
            last_error: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        }
    }
}

/// Result of asking for one leg to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Added,
    AlreadyScheduled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegSchedule {
    pub outcome: ScheduleOutcome,
    pub key: String,
    pub window: CheckinWindow,
}

/// Per-leg status in a batch scheduling report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegStatus {
    Added,
    AlreadyScheduled,
    Failed { error: String },
}

impl From<ScheduleOutcome> for LegStatus {
    fn from(outcome: ScheduleOutcome) -> Self {
        match outcome {
            ScheduleOutcome::Added => LegStatus::Added,
            ScheduleOutcome::AlreadyScheduled => LegStatus::AlreadyScheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegReport {
    pub leg: FlightLeg,
    pub window: Option<CheckinWindow>,
    pub status: LegStatus,
}

/// A looked-up departure whose airport timezone could not be resolved.
#[derive(Debug)]
pub struct UnresolvedLeg {
    pub departure: LegDeparture,
    pub error: CheckinError,
}

/// One departure of a reservation after timezone resolution.
pub type ResolvedLeg = std::result::Result<FlightLeg, UnresolvedLeg>;

/// How an executed trigger ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(String),
}

/// Counts from startup recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Live triggers whose check-in instant already passed.
    pub missed: usize,
    /// Triggers left `running` by a previous process, put back to `pending`.
    pub requeued: usize,
}
