// src/month.rs

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::ReconError;
use crate::normalize::{first_string, lookup};

const MONTH_KEYS: &[&str] = &["month", "for_month", "period", "month_name"];
const FROM_KEYS: &[&str] = &["from", "date_from", "from_date", "start_date", "period_start"];
const TO_KEYS: &[&str] = &["to", "date_to", "to_date", "end_date", "period_end"];
const ROW_DATE_KEYS: &[&str] = &["date", "day", "work_date"];

/// A calendar month and its inclusive `[from, to]` day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthRange {
    /// Parses `YYYY-MM` (a full ISO date is accepted and truncated to its month).
    pub fn parse(month: &str) -> Result<Self, ReconError> {
        let prefix: String = month.trim().chars().take(7).collect();
        let first = NaiveDate::parse_from_str(&format!("{}-01", prefix), "%Y-%m-%d").map_err(|_| {
            ReconError::validation(format!("Invalid month '{}', expected YYYY-MM", month))
        })?;
        Ok(Self::containing(first))
    }

    pub fn containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let next_month = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
        };
        let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(first);
        Self { first, last }
    }

    pub fn month(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }

    pub fn from(&self) -> String {
        self.first.format("%Y-%m-%d").to_string()
    }

    pub fn to(&self) -> String {
        self.last.format("%Y-%m-%d").to_string()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }

    /// Whether `payload` belongs to this month; see [`matches_month`].
    pub fn matches(&self, payload: &Value) -> bool {
        matches_month(payload, &self.month(), &self.from(), &self.to())
    }
}

fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Decides whether a fetched payroll object belongs to `want_month`.
///
/// Checked in order: an explicit month field (first 7 chars), a from/to pair
/// (first 10 chars each), row dates, day-map keys. An object with none of
/// these is accepted.
pub fn matches_month(payload: &Value, want_month: &str, from: &str, to: &str) -> bool {
    if let Some(month) = first_string(payload, MONTH_KEYS) {
        return prefix(&month, 7) == want_month;
    }

    if let (Some(f), Some(t)) = (first_string(payload, FROM_KEYS), first_string(payload, TO_KEYS)) {
        return prefix(&f, 10) == from && prefix(&t, 10) == to;
    }

    if let Some(rows) = lookup(payload, "rows").and_then(Value::as_array) {
        return rows.iter().any(|row| {
            first_string(row, ROW_DATE_KEYS)
                .map(|d| d.starts_with(want_month))
                .unwrap_or(false)
        });
    }

    if let Some(days) = lookup(payload, "days").and_then(Value::as_object) {
        return days.keys().any(|day| day.starts_with(want_month));
    }

    true
}
