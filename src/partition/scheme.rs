use std::fmt::Write;

use anyhow::{bail, Result};
use chrono::format::{Item, Numeric, StrftimeItems};
use chrono::{DateTime, Duration, Utc};

/// Width of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    /// Derives the step from a strftime key format: a format that renders
    /// the hour (`%H`, `%I`, `%k`, `%l`, or composites such as `%T`) is
    /// hourly, anything coarser is daily.
    pub fn from_format(format: &str) -> Self {
        let renders_hour = StrftimeItems::new(format).any(|item| {
            matches!(
                item,
                Item::Numeric(Numeric::Hour | Numeric::Hour12, _)
            )
        });

        if renders_hour {
            Self::Hourly
        } else {
            Self::Daily
        }
    }

    pub fn step(self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::days(1),
        }
    }
}

/// Maps event times to partition keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionScheme {
    granularity: Granularity,
    format: String,
}

impl PartitionScheme {
    /// Creates a scheme, rejecting strftime formats chrono cannot render.
    pub fn new(granularity: Granularity, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        if format.is_empty() {
            bail!("partition format is empty");
        }
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            bail!("invalid partition format {format:?}");
        }

        Ok(Self {
            granularity,
            format,
        })
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Partition key for an instant.
    pub fn key(&self, time: &DateTime<Utc>) -> String {
        let mut key = String::with_capacity(self.format.len() + 8);
        let _ = write!(key, "{}", time.format(&self.format));
        key
    }

    /// Distinct keys covering `[from, to)`, stepping by the granularity.
    pub fn keys_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<String> {
        let step = self.granularity.step();
        let mut keys: Vec<String> = Vec::new();
        let mut at = from;

        while at < to {
            let key = self.key(&at);
            if keys.last() != Some(&key) {
                keys.push(key);
            }
            at += step;
        }

        keys
    }
}
