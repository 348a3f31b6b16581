//! `checkin-client`: adapters for everything the check-in core talks to:
//! the remote check-in API, reservation lookup, airport timezones and
//! authenticated header acquisition.

pub mod error;
pub mod headers;
pub mod remote;
pub mod retry;
pub mod timezone;

pub use error::{ClientError, ProbeFailure};
pub use headers::{BasicHeaderProvider, HeaderProvider, HeaderSet, StaticHeaderProvider};
pub use remote::{
    CheckinAction, CheckinApi, CommitResult, ReadyData, ReservationLookup, SouthwestClient,
};
pub use retry::{retry_fixed, RetryPolicy};
pub use timezone::{CachedTimezoneResolver, OpenFlightsResolver, TimezoneResolver};
