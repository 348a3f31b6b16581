//! `checkin-scheduler`: deduplicated check-in triggers with SQLite persistence.
//!
//! # Overview
//!
//! [`scheduler::TriggerScheduler`] turns a reservation into one trigger per
//! eligible leg, keyed deterministically so repeated requests never create a
//! second trigger. Triggers live in a SQLite `triggers` table. The
//! [`dispatcher::Dispatcher`] polls the table and forwards every trigger whose
//! boot instant has arrived to the delivery loop.
//!
//! # Trigger lifecycle
//!
//! | Status      | Meaning                                              |
//! |-------------|------------------------------------------------------|
//! | `pending`   | Waiting for its boot instant                         |
//! | `running`   | Claimed by the dispatcher, executor in progress      |
//! | `completed` | Check-in committed                                   |
//! | `failed`    | Race exhausted or commit rejected; see `last_error`  |
//! | `missed`    | Check-in instant passed while nothing was running    |

pub mod db;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod scheduler;
pub mod store;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::{Result, SchedulerError};
pub use key::TriggerKeyBuilder;
pub use scheduler::TriggerScheduler;
pub use store::{SqliteTriggerStore, TriggerStore};
pub use types::{
    LegReport, LegSchedule, LegStatus, Recovery, ResolvedLeg, RunOutcome, ScheduleOutcome,
    Trigger, TriggerStatus, UnresolvedLeg,
};
