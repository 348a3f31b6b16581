use std::sync::{Mutex, MutexGuard};

use checkin_core::TriggerPayload;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use tracing::{error, info, warn};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::{Recovery, RunOutcome, Trigger, TriggerStatus},
};

const SELECT_COLUMNS: &str =
    "key, user_id, fire_at, payload, status, last_error, created_at, updated_at";

/// Persistence for check-in triggers.
///
/// Implementations must make `create` fail with [`SchedulerError::Duplicate`]
/// when the key already exists, and `claim_due` must never hand the same
/// trigger out twice.
pub trait TriggerStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool>;

    fn create(&self, trigger: &Trigger) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<Trigger>>;

    /// All triggers whose key starts with `prefix`, soonest check-in first.
    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Trigger>>;

    /// Flip every pending trigger with `fire_at <= now` to running and return them.
    fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Trigger>>;

    /// Hand a claimed trigger back to pending.
    fn release(&self, key: &str) -> Result<()>;

    fn finish(&self, key: &str, outcome: &RunOutcome) -> Result<()>;

    /// Startup repair: live triggers whose check-in instant is not after `now`
    /// become missed, and running leftovers that can still make it are requeued.
    fn recover(&self, now: DateTime<Utc>) -> Result<Recovery>;
}

/// [`TriggerStore`] over a single SQLite connection.
pub struct SqliteTriggerStore {
    conn: Mutex<Connection>,
}

impl SqliteTriggerStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)
    }

    fn set_status(
        &self,
        key: &str,
        status: TriggerStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE triggers SET status = ?1, last_error = ?2, updated_at = ?3 WHERE key = ?4",
            rusqlite::params![status.to_string(), last_error, Utc::now().to_rfc3339(), key],
        )?;
        if n == 0 {
            return Err(SchedulerError::TriggerNotFound {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl TriggerStore for SqliteTriggerStore {
    fn exists(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row("SELECT 1 FROM triggers WHERE key = ?1", [key], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn create(&self, trigger: &Trigger) -> Result<()> {
        let payload = serde_json::to_string(&trigger.payload)
            .map_err(checkin_core::CheckinError::from)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO triggers
             (key, user_id, fire_at, available_at, payload, status, last_error,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                trigger.key,
                trigger.user_id,
                trigger.fire_at.timestamp(),
                trigger.payload.checkin_available_epoch,
                payload,
                trigger.status.to_string(),
                trigger.last_error,
                trigger.created_at,
                trigger.updated_at,
            ],
        );
        match inserted {
            Ok(_) => {
                info!(key = %trigger.key, fire_at = %trigger.fire_at, "trigger created");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(SchedulerError::Duplicate {
                    key: trigger.key.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, key: &str) -> Result<Option<Trigger>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM triggers WHERE key = ?1"),
                [key],
                RawTrigger::from_row,
            )
            .optional()?;
        raw.map(RawTrigger::decode).transpose()
    }

    fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Trigger>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM triggers
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY available_at, key"
        ))?;
        let rows: Vec<RawTrigger> = stmt
            .query_map([prefix], RawTrigger::from_row)?
            .collect::<rusqlite::Result<_>>()?;

        // A row that no longer decodes is reported and skipped rather than
        // failing the whole listing.
        let triggers = rows
            .into_iter()
            .filter_map(|raw| match raw.decode() {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("skipping undecodable trigger: {e}");
                    None
                }
            })
            .collect();
        Ok(triggers)
    }

    fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Trigger>> {
        let conn = self.conn()?;
        let rows: Vec<RawTrigger> = {
            let mut stmt = conn.prepare_cached(&format!(
                "UPDATE triggers SET status = 'running', updated_at = ?2
                 WHERE status = 'pending' AND fire_at <= ?1
                 RETURNING {SELECT_COLUMNS}"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![now.timestamp(), now.to_rfc3339()],
                    RawTrigger::from_row,
                )?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };

        let mut claimed = Vec::with_capacity(rows.len());
        for raw in rows {
            let key = raw.key.clone();
            match raw.decode() {
                Ok(t) => claimed.push(t),
                Err(e) => {
                    error!(%key, "claimed trigger does not decode: {e}");
                    conn.execute(
                        "UPDATE triggers SET status = 'failed', last_error = ?1 WHERE key = ?2",
                        rusqlite::params![e.to_string(), key],
                    )?;
                }
            }
        }
        claimed.sort_by_key(|t| t.fire_at);
        Ok(claimed)
    }

    fn release(&self, key: &str) -> Result<()> {
        self.set_status(key, TriggerStatus::Pending, None)
    }

    fn finish(&self, key: &str, outcome: &RunOutcome) -> Result<()> {
        match outcome {
            RunOutcome::Completed => self.set_status(key, TriggerStatus::Completed, None),
            RunOutcome::Failed(reason) => {
                self.set_status(key, TriggerStatus::Failed, Some(reason.as_str()))
            }
        }
    }

    fn recover(&self, now: DateTime<Utc>) -> Result<Recovery> {
        let mut conn = self.conn()?;
        let now_str = now.to_rfc3339();
        let tx = conn.transaction()?;
        let missed = tx.execute(
            "UPDATE triggers
             SET status = 'missed',
                 last_error = 'check-in window passed before execution',
                 updated_at = ?2
             WHERE status IN ('pending', 'running') AND available_at <= ?1",
            rusqlite::params![now.timestamp(), now_str],
        )?;
        let requeued = tx.execute(
            "UPDATE triggers SET status = 'pending', updated_at = ?1 WHERE status = 'running'",
            [&now_str],
        )?;
        tx.commit()?;

        if missed > 0 {
            warn!(count = missed, "triggers marked missed on startup");
        }
        if requeued > 0 {
            info!(count = requeued, "interrupted triggers requeued");
        }
        Ok(Recovery { missed, requeued })
    }
}

struct RawTrigger {
    key: String,
    user_id: String,
    fire_at: i64,
    payload: String,
    status: String,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawTrigger {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            user_id: row.get(1)?,
            fire_at: row.get(2)?,
            payload: row.get(3)?,
            status: row.get(4)?,
            last_error: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Trigger> {
        let corrupt = |reason: String| SchedulerError::Corrupt {
            key: self.key.clone(),
            reason,
        };
        let fire_at = DateTime::from_timestamp(self.fire_at, 0)
            .ok_or_else(|| corrupt(format!("fire_at out of range: {}", self.fire_at)))?;
        let payload: TriggerPayload =
            serde_json::from_str(&self.payload).map_err(|e| corrupt(e.to_string()))?;
        let status: TriggerStatus = self.status.parse().map_err(corrupt)?;
        Ok(Trigger {
            key: self.key,
            user_id: self.user_id,
            fire_at,
            payload,
            status,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
