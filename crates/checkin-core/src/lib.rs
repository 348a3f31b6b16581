//! `checkin-core`: data model, check-in window arithmetic, errors and config
//! shared by every crate in the workspace.

pub mod config;
pub mod error;
pub mod trigger;
pub mod types;
pub mod window;

pub use error::{CheckinError, Result};
pub use trigger::TriggerPayload;
pub use types::{CheckinWindow, FlightLeg, LegDeparture, Reservation};
