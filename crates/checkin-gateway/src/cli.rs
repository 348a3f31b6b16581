use checkin_core::Reservation;
use clap::{Args, Parser, Subcommand};

/// Automated airline check-in service.
#[derive(Debug, Parser)]
#[command(name = "checkin-gateway", version, about)]
pub struct Cli {
    /// Config file path. Falls back to `CHECKIN_CONFIG`, then `~/.checkin/checkin.toml`.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API, the dispatcher and the delivery loop (default).
    Serve,
    /// Run the ready-check race and commit right now, without scheduling.
    CheckIn(ReservationArgs),
    /// Print the check-in window of every leg on a reservation.
    Windows(ReservationArgs),
}

#[derive(Debug, Args)]
pub struct ReservationArgs {
    /// Confirmation number, e.g. ABC123.
    pub confirmation_number: String,
    pub first_name: String,
    pub last_name: String,
}

impl ReservationArgs {
    pub fn reservation(&self) -> Reservation {
        Reservation::new(
            self.confirmation_number.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
        )
        .trimmed()
    }
}

impl Cli {
    pub fn config_path(&self) -> Option<String> {
        self.config
            .clone()
            .or_else(|| std::env::var("CHECKIN_CONFIG").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::parse_from(["checkin-gateway"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn check_in_takes_reservation_fields() {
        let cli = Cli::parse_from([
            "checkin-gateway",
            "--config",
            "/tmp/c.toml",
            "check-in",
            "ABC123",
            "Ada",
            "Lovelace",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        match cli.command {
            Some(Commands::CheckIn(args)) => {
                assert_eq!(args.reservation(), Reservation::new("ABC123", "Ada", "Lovelace"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
