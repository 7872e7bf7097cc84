//! Host-side coordinator: job progress display and usage statistics.
//!
//! Statistics live under the `statistics` key of the shared state file:
//!
//! ```json
//! {"statistics": {"totalDeleted": 42, "installDate": "...", "lastUsed": "..."}}
//! ```
//!
//! Dates are written as RFC 3339 strings. Epoch milliseconds are accepted on
//! read, since other hosts sharing the record store them that way.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listsweep::storage::{self, KEY_STATISTICS};
use listsweep::{Coordinator, Notification, Store, SweepError, SweepResult};
use serde::{Deserialize, Deserializer, Serialize};

use crate::output::ProgressReporter;

/// Persisted usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Entries removed over all jobs
    pub total_deleted: u64,
    /// First use
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub install_date: DateTime<Utc>,
    /// Start of the most recent job
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_used: Option<DateTime<Utc>>,
}

/// RFC 3339 text or epoch milliseconds
mod timestamp {
    use super::{DateTime, Deserialize, Deserializer, Utc};
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(i64),
        Text(DateTime<Utc>),
    }

    impl Repr {
        fn into_datetime<E: Error>(self) -> Result<DateTime<Utc>, E> {
            match self {
                Self::Text(at) => Ok(at),
                Self::Millis(ms) => DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| E::custom(format!("timestamp {ms}ms out of range"))),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        Repr::deserialize(deserializer)?.into_datetime()
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<Repr>::deserialize(deserializer)?
            .map(Repr::into_datetime)
            .transpose()
    }
}

impl Statistics {
    /// Fresh counters
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_deleted: 0,
            install_date: now,
            last_used: None,
        }
    }

    /// Derived figures as of `now`
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> StatsSummary {
        let days_since_install = (now - self.install_date).num_days().max(0);
        let average_per_day = if days_since_install < 1 {
            0.0
        } else {
            self.total_deleted as f64 / days_since_install as f64
        };
        StatsSummary {
            total_deleted: self.total_deleted,
            install_date: self.install_date,
            last_used: self.last_used,
            days_since_install,
            average_per_day,
        }
    }
}

/// What `stats` prints
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    /// Entries removed over all jobs
    pub total_deleted: u64,
    /// First use
    pub install_date: DateTime<Utc>,
    /// Start of the most recent job
    pub last_used: Option<DateTime<Utc>>,
    /// Whole days since first use
    pub days_since_install: i64,
    /// Removals per day, 0 within the first day
    pub average_per_day: f64,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total deleted:      {}", self.total_deleted)?;
        writeln!(f, "Installed:          {}", self.install_date.format("%Y-%m-%d %H:%M UTC"))?;
        match self.last_used {
            Some(at) => writeln!(f, "Last used:          {}", at.format("%Y-%m-%d %H:%M UTC"))?,
            None => writeln!(f, "Last used:          never")?,
        }
        writeln!(f, "Days since install: {}", self.days_since_install)?;
        write!(f, "Average per day:    {:.1}", self.average_per_day)
    }
}

/// Read the statistics, initializing them on first use
///
/// A record that exists but does not decode is an error and is left as is.
pub fn load_statistics(store: &dyn Store) -> SweepResult<Statistics> {
    if let Some(value) = store.get(KEY_STATISTICS)? {
        return serde_json::from_value(value).map_err(|err| {
            SweepError::storage(format!("unreadable {KEY_STATISTICS} record: {err}"))
        });
    }
    let stats = Statistics::new(Utc::now());
    storage::save(store, KEY_STATISTICS, &stats)?;
    tracing::info!(install_date = %stats.install_date, "statistics initialized");
    Ok(stats)
}

/// Coordinator for the command-line host
pub struct HostCoordinator {
    store: Arc<dyn Store>,
    reporter: Arc<ProgressReporter>,
}

impl fmt::Debug for HostCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCoordinator")
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

impl HostCoordinator {
    /// Coordinator writing statistics to `store` and progress to `reporter`
    #[must_use]
    pub fn new(store: Arc<dyn Store>, reporter: Arc<ProgressReporter>) -> Self {
        Self { store, reporter }
    }

    /// Current statistics
    pub fn statistics(&self) -> SweepResult<Statistics> {
        load_statistics(self.store.as_ref())
    }

    fn update(&self, change: impl FnOnce(&mut Statistics)) -> SweepResult<()> {
        let mut stats = self.statistics()?;
        change(&mut stats);
        storage::save(self.store.as_ref(), KEY_STATISTICS, &stats)
    }

    fn add_deleted(&self, count: usize) -> SweepResult<()> {
        self.update(|stats| stats.total_deleted += count as u64)
    }
}

#[async_trait]
impl Coordinator for HostCoordinator {
    async fn notify(&self, notification: Notification) -> SweepResult<()> {
        match notification {
            Notification::DeleteStarted { count } => {
                self.reporter.start_progress(count as u64, "Removing");
                self.update(|stats| stats.last_used = Some(Utc::now()))
            }
            Notification::DeleteProgress { current, total } => {
                self.reporter.set_position(current as u64, total as u64);
                Ok(())
            }
            Notification::DeleteCompleted { count } => {
                self.reporter.clear_progress();
                self.add_deleted(count)
            }
            Notification::DeleteCancelled { deleted_count } => {
                self.reporter.clear_progress();
                if deleted_count > 0 {
                    self.add_deleted(deleted_count)
                } else {
                    Ok(())
                }
            }
        }
    }
}
