use crate::domain::fine::{DEFAULT_FINE_PER_DAY, FineRule};
use crate::error::{LibraryError, Result};
use chrono::{Days, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;

/// Runtime settings, read from command-line flags or the matching
/// environment variables.
#[derive(Debug, Clone, Args)]
pub struct LibraryConfig {
    /// Database connection URL
    #[arg(
        long,
        env = "LIBRARY_DATABASE_URL",
        default_value = "sqlite://library.db",
        global = true
    )]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "LIBRARY_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    pub max_connections: u32,

    /// Seconds to wait for a locked database before failing
    #[arg(long, env = "LIBRARY_BUSY_TIMEOUT_SECS", default_value_t = 5, global = true)]
    pub busy_timeout_secs: u64,

    /// Loan period in days, used to compute due dates
    #[arg(long, env = "LIBRARY_LOAN_DAYS", default_value_t = 7, global = true)]
    pub loan_days: u64,

    /// Fine charged per day a book is returned late
    #[arg(long, env = "LIBRARY_FINE_PER_DAY", default_value = "0.50", global = true)]
    pub fine_per_day: Decimal,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://library.db".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            loan_days: 7,
            fine_per_day: DEFAULT_FINE_PER_DAY,
            log_json: false,
        }
    }
}

impl LibraryConfig {
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn fine_rule(&self) -> Result<FineRule> {
        FineRule::new(self.fine_per_day)
    }

    /// Due date of a loan registered on `today`.
    pub fn due_date(&self, today: NaiveDate) -> Result<NaiveDate> {
        today
            .checked_add_days(Days::new(self.loan_days))
            .ok_or_else(|| {
                LibraryError::ValidationError(format!(
                    "Loan period of {} days overflows the calendar",
                    self.loan_days
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(LibraryError::ValidationError(
                "At least one database connection is required".to_string(),
            ));
        }
        if self.loan_days == 0 {
            return Err(LibraryError::ValidationError(
                "Loan period must be at least one day".to_string(),
            ));
        }
        self.fine_rule().map(|_| ())
    }
}
