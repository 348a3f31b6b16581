//! `checkin-engine`: everything that happens once a trigger fires: the
//! wait with heartbeat, the parallel-burst readiness race and the single
//! commit, tied together by [`executor::Executor`].

pub mod commit;
pub mod executor;
pub mod heartbeat;
pub mod race;

pub use commit::CheckinCommitter;
pub use executor::{CheckinReport, Executor};
pub use heartbeat::wait_with_heartbeat;
pub use race::{PollAttempt, PollRace, RaceWin};
