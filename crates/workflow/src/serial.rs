//! Year-scoped serial numbers (`2025-001`, `2025-002`, ...).
//!
//! Allocation reads the year's highest serial inside a snapshot and inserts
//! the next one. That read locks allocation in the store until the snapshot
//! commits, so concurrent creators queue instead of colliding. The unique
//! constraint on serial numbers stays the backstop: a backend that reports
//! `SerialConflict` anyway gets a fresh read after a short backoff.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use convenios_storage::{AgreementRecord, ConvenioStorage, StorageError};
use tracing::debug;

use crate::error::WorkflowError;
use crate::types::ParseCodeError;

/// Sequences are zero-padded to at least this many digits.
pub const SERIAL_MIN_WIDTH: usize = 3;

/// Allocation attempts before giving up with a conflict.
pub const MAX_SERIAL_ATTEMPTS: u32 = 8;

/// Backoff unit between attempts; attempt `n` waits `n` units.
const SERIAL_RETRY_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber {
    pub year: i32,
    pub sequence: u32,
}

impl SerialNumber {
    pub fn first(year: i32) -> Self {
        SerialNumber { year, sequence: 1 }
    }

    /// The serial following `latest`, or the year's first when there is no
    /// prior serial or the latest belongs to another year.
    pub fn next_after(latest: Option<&str>, year: i32) -> Result<Self, WorkflowError> {
        let Some(latest) = latest else {
            return Ok(Self::first(year));
        };
        let parsed: SerialNumber = latest
            .parse()
            .map_err(|e: ParseCodeError| WorkflowError::Internal(e.to_string()))?;
        if parsed.year != year {
            return Ok(Self::first(year));
        }
        let sequence = parsed.sequence.checked_add(1).ok_or_else(|| {
            WorkflowError::Internal(format!("serial sequence exhausted for {}", year))
        })?;
        Ok(SerialNumber { year, sequence })
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.year,
            self.sequence,
            width = SERIAL_MIN_WIDTH
        )
    }
}

impl FromStr for SerialNumber {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseCodeError {
            kind: "serial number",
            value: s.to_string(),
        };
        // Split on the last dash so negative years round-trip through Display.
        let (year, sequence) = s.rsplit_once('-').ok_or_else(invalid)?;
        let year_digits = year.strip_prefix('-').unwrap_or(year);
        if year_digits.is_empty() || sequence.len() < SERIAL_MIN_WIDTH {
            return Err(invalid());
        }
        if !year_digits.bytes().all(|b| b.is_ascii_digit())
            || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        Ok(SerialNumber { year, sequence })
    }
}

/// Allocate the next serial of `year` and insert the record `build` returns
/// for it, committing the snapshot.
///
/// Retries on `SerialConflict` up to [`MAX_SERIAL_ATTEMPTS`] times.
pub async fn allocate_and_insert<S, F>(
    storage: &S,
    year: i32,
    mut build: F,
) -> Result<AgreementRecord, WorkflowError>
where
    S: ConvenioStorage,
    F: FnMut(&SerialNumber) -> AgreementRecord + Send,
{
    for attempt in 1..=MAX_SERIAL_ATTEMPTS {
        let mut snap = storage.begin_snapshot().await?;
        let latest = match storage.latest_serial_for_year(&mut snap, year).await {
            Ok(latest) => latest,
            Err(e) => {
                let _ = storage.abort_snapshot(snap).await;
                return Err(e.into());
            }
        };
        let serial = match SerialNumber::next_after(latest.as_deref(), year) {
            Ok(serial) => serial,
            Err(e) => {
                let _ = storage.abort_snapshot(snap).await;
                return Err(e);
            }
        };
        let record = build(&serial);
        let inserted = storage.insert_agreement(&mut snap, record.clone()).await;
        let committed = match inserted {
            Ok(()) => storage.commit_snapshot(snap).await,
            Err(e) => {
                let _ = storage.abort_snapshot(snap).await;
                Err(e)
            }
        };
        match committed {
            Ok(()) => return Ok(record),
            Err(StorageError::SerialConflict { serial_number }) => {
                debug!(%serial_number, attempt, "serial taken, retrying");
                tokio::time::sleep(SERIAL_RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(WorkflowError::Conflict(format!(
        "could not allocate a serial number for {} after {} attempts",
        year, MAX_SERIAL_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_minimum_width() {
        assert_eq!(SerialNumber { year: 2025, sequence: 7 }.to_string(), "2025-007");
        assert_eq!(
            SerialNumber { year: 2025, sequence: 1234 }.to_string(),
            "2025-1234"
        );
    }

    #[test]
    fn first_of_year_without_prior() {
        let next = SerialNumber::next_after(None, 2025).unwrap();
        assert_eq!(next.to_string(), "2025-001");
    }

    #[test]
    fn continues_same_year() {
        let next = SerialNumber::next_after(Some("2025-007"), 2025).unwrap();
        assert_eq!(next.to_string(), "2025-008");
    }

    #[test]
    fn grows_past_three_digits() {
        let next = SerialNumber::next_after(Some("2025-999"), 2025).unwrap();
        assert_eq!(next.to_string(), "2025-1000");
    }

    #[test]
    fn restarts_on_new_year() {
        let next = SerialNumber::next_after(Some("2024-412"), 2025).unwrap();
        assert_eq!(next.to_string(), "2025-001");
    }

    #[test]
    fn malformed_latest_is_internal_error() {
        let err = SerialNumber::next_after(Some("2025-abc"), 2025).unwrap_err();
        assert_eq!(err.kind(), "internal");
        assert!("2025-01".parse::<SerialNumber>().is_err());
        assert!("2025-000".parse::<SerialNumber>().is_err());
        assert!("-001".parse::<SerialNumber>().is_err());
        assert!("2025001".parse::<SerialNumber>().is_err());
    }

    #[test]
    fn every_displayed_year_parses_back() {
        for year in [1, 25, 999, 2025, 12025, -44] {
            let serial = SerialNumber { year, sequence: 12 };
            assert_eq!(serial.to_string().parse::<SerialNumber>(), Ok(serial));
            let next = SerialNumber::next_after(Some(&serial.to_string()), year).unwrap();
            assert_eq!(next.sequence, 13);
        }
    }
}
