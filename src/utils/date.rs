use chrono::NaiveDate;

use crate::error::AppError;

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    // Try YYYYMMDD
    if s.len() == 8 {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return Ok(d);
        }
    }
    // Try YYYY-MM-DD
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    Err(AppError::InvalidDate {
        input: s.to_string(),
    })
}

/// Inclusive date range restricting which messages a sync run covers.
/// Dates are compared in the configured timezone, not in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DateFilter {
    pub(crate) since: Option<NaiveDate>,
    pub(crate) until: Option<NaiveDate>,
}

impl DateFilter {
    /// Build from the `--date` / `--since` / `--until` flags. `--date`
    /// pins both ends to the same day and wins over the other two.
    pub(crate) fn from_args(
        date: Option<&str>,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<Self, AppError> {
        if let Some(d) = date {
            let day = parse_date(d)?;
            return Ok(DateFilter {
                since: Some(day),
                until: Some(day),
            });
        }
        let since = since.map(parse_date).transpose()?;
        let until = until.map(parse_date).transpose()?;
        if let Some(s) = since
            && let Some(u) = until
            && s > u
        {
            return Err(AppError::Configuration {
                reason: format!("--since ({s}) must not be after --until ({u})"),
            });
        }
        Ok(DateFilter { since, until })
    }

    /// True when no date restriction applies.
    pub(crate) fn is_unrestricted(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    pub(crate) fn contains(&self, date: NaiveDate) -> bool {
        if let Some(since) = self.since
            && date < since
        {
            return false;
        }
        if let Some(until) = self.until
            && date > until
        {
            return false;
        }
        true
    }
}
