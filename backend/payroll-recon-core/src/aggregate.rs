// src/aggregate.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{AdjustmentKind, AttendanceLogEntry, DayRow, PayrollMonth};
use crate::month::MonthRange;
use crate::normalize::{
    days_map_to_rows, decode_adjustments, decode_day_row, first_decimal, lookup, round_hours,
};

// --- Alias chains for top-level totals ---

const HOURS_TOTAL_KEYS: &[&str] = &[
    "hours_total",
    "hours",
    "total_hours",
    "totals.hours",
    "totals.hours_total",
    "totals.total_hours",
];
const LATE_MINUTES_KEYS: &[&str] = &["late_minutes", "late_minutes_total", "totals.late_minutes"];
const BASE_PAY_KEYS: &[&str] = &[
    "base_pay",
    "base_salary",
    "salary",
    "totals.base_pay",
    "totals.base_salary",
];
const FOOD_KEYS: &[&str] = &[
    "food_allowance",
    "food",
    "food_allowance_total",
    "totals.food_allowance",
    "totals.food",
];
const OTHER_KEYS: &[&str] = &[
    "other_allowance",
    "other",
    "other_allowance_total",
    "totals.other_allowance",
    "totals.other",
];
const DEDUCTIONS_KEYS: &[&str] = &[
    "deductions",
    "deductions_total",
    "deduct",
    "totals.deductions",
    "totals.deduct",
];
const LATE_PENALTY_KEYS: &[&str] = &[
    "late_penalty",
    "late_penalty_total",
    "totals.late_penalty",
    "totals.late",
];
const ADVANCES_KEYS: &[&str] = &[
    "advances",
    "advances_total",
    "advance",
    "totals.advances",
    "totals.advance",
];
const TOTAL_PAY_KEYS: &[&str] = &[
    "total_pay",
    "net_pay",
    "total",
    "totals.total_pay",
    "totals.net_pay",
    "totals.total",
];

/// Builds the canonical month record from a raw payroll payload.
pub fn aggregate(raw: &Value, range: &MonthRange) -> PayrollMonth {
    aggregate_with_logs(raw, range, &[])
}

/// Like [`aggregate`], with a log stream used when the payload has no hours
/// or late-minute totals of its own. Log hours take precedence over row sums.
pub fn aggregate_with_logs(
    raw: &Value,
    range: &MonthRange,
    logs: &[AttendanceLogEntry],
) -> PayrollMonth {
    let rows = complete_calendar(extract_rows(raw), range);
    let logs = logs_in_range(logs, range);
    let logs = logs.as_slice();

    // Logs beat rows: rows built from logs are already rounded per day.
    let hours_total = first_decimal(raw, HOURS_TOTAL_KEYS)
        .or_else(|| hours_from_logs(logs))
        .or_else(|| row_total(&rows, |r| Some(r.hours)))
        .unwrap_or(Decimal::ZERO);

    let late_minutes = first_decimal(raw, LATE_MINUTES_KEYS)
        .or_else(|| late_minutes_from_logs(logs))
        .unwrap_or(Decimal::ZERO);

    let base_pay = first_decimal(raw, BASE_PAY_KEYS).unwrap_or(Decimal::ZERO);
    let food_allowance = first_decimal(raw, FOOD_KEYS)
        .or_else(|| row_total(&rows, |r| Some(r.food_allowance)))
        .unwrap_or(Decimal::ZERO);
    let other_allowance = first_decimal(raw, OTHER_KEYS)
        .or_else(|| row_total(&rows, |r| Some(r.other_allowance)))
        .unwrap_or(Decimal::ZERO);
    let deductions = first_decimal(raw, DEDUCTIONS_KEYS)
        .or_else(|| listed_total(raw, "deductions", AdjustmentKind::Deduction))
        .or_else(|| row_total(&rows, |r| Some(r.deductions)))
        .unwrap_or(Decimal::ZERO);
    let late_penalty = first_decimal(raw, LATE_PENALTY_KEYS)
        .or_else(|| row_total(&rows, |r| Some(r.late_penalty)))
        .unwrap_or(Decimal::ZERO);
    let advances = first_decimal(raw, ADVANCES_KEYS)
        .or_else(|| listed_total(raw, "advances", AdjustmentKind::Advance))
        .or_else(|| row_total(&rows, |r| r.advance))
        .unwrap_or(Decimal::ZERO);

    let (total_pay, total_pay_estimated) = match first_decimal(raw, TOTAL_PAY_KEYS) {
        Some(total) => (total, false),
        None => {
            let estimate =
                base_pay + food_allowance + other_allowance - deductions - late_penalty - advances;
            debug!("No total pay in payload for {}; estimated {}", range.month(), estimate);
            (estimate, true)
        }
    };

    PayrollMonth {
        month: range.month(),
        from: range.from(),
        to: range.to(),
        hours_total,
        late_minutes,
        base_pay,
        food_allowance,
        other_allowance,
        deductions,
        late_penalty,
        advances,
        total_pay,
        total_pay_estimated,
        rows,
    }
}

/// Row source priority: `rows` array, `days` map, `details` (array or map).
fn extract_rows(raw: &Value) -> Vec<DayRow> {
    if let Some(rows) = lookup(raw, "rows").and_then(Value::as_array) {
        return decode_rows(rows);
    }
    if let Some(days) = lookup(raw, "days").and_then(Value::as_object) {
        return days_map_to_rows(days);
    }
    match lookup(raw, "details") {
        Some(Value::Array(rows)) => decode_rows(rows),
        Some(Value::Object(days)) => days_map_to_rows(days),
        _ => Vec::new(),
    }
}

fn decode_rows(records: &[Value]) -> Vec<DayRow> {
    let rows: Vec<DayRow> = records.iter().filter_map(decode_day_row).collect();
    if rows.len() < records.len() {
        warn!(
            "Skipped {} payroll row(s) without a day label",
            records.len() - rows.len()
        );
    }
    rows
}

fn iso_day(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label.get(..10)?, "%Y-%m-%d").ok()
}

/// Emits one row per calendar day of `range` when every row is ISO-dated,
/// merging duplicate days and dropping days outside the range. Rows with
/// free-form labels are returned untouched.
fn complete_calendar(rows: Vec<DayRow>, range: &MonthRange) -> Vec<DayRow> {
    if rows.iter().any(|r| iso_day(&r.day).is_none()) {
        return rows;
    }

    let mut by_day: BTreeMap<NaiveDate, DayRow> = BTreeMap::new();
    for row in rows {
        let Some(date) = iso_day(&row.day) else {
            continue;
        };
        if !range.contains(date) {
            debug!("Dropping payroll row for {} outside {}", row.day, range.month());
            continue;
        }
        match by_day.get_mut(&date) {
            Some(existing) => merge_row(existing, &row),
            None => {
                by_day.insert(date, row);
            }
        }
    }

    range
        .days()
        .map(|date| {
            let label = date.format("%Y-%m-%d").to_string();
            match by_day.remove(&date) {
                Some(row) => DayRow { day: label, ..row },
                None => DayRow::empty(label),
            }
        })
        .collect()
}

fn merge_row(into: &mut DayRow, other: &DayRow) {
    into.hours += other.hours;
    into.food_allowance += other.food_allowance;
    into.other_allowance += other.other_allowance;
    into.deductions += other.deductions;
    into.late_penalty += other.late_penalty;
    into.advance = match (into.advance, other.advance) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
}

/// Sum over rows, or `None` when the rows carry nothing for this field.
fn row_total<F>(rows: &[DayRow], field: F) -> Option<Decimal>
where
    F: Fn(&DayRow) -> Option<Decimal>,
{
    let values: Vec<Decimal> = rows.iter().filter_map(&field).collect();
    if values.iter().all(|v| v.is_zero()) {
        return None;
    }
    Some(values.into_iter().sum())
}

/// Sum of an embedded adjustment list (e.g. `deductions: [{amount: ...}]`).
fn listed_total(raw: &Value, key: &str, kind: AdjustmentKind) -> Option<Decimal> {
    let list = lookup(raw, key)?;
    if !list.is_array() {
        return None;
    }
    Some(decode_adjustments(list, kind).iter().map(|a| a.amount).sum())
}

fn logs_in_range(logs: &[AttendanceLogEntry], range: &MonthRange) -> Vec<AttendanceLogEntry> {
    logs.iter()
        .filter(|entry| {
            entry
                .day()
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
                .map(|day| range.contains(day))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Hours from the raw log stream: each entry's hours, else its duration in minutes / 60.
pub fn hours_from_logs(logs: &[AttendanceLogEntry]) -> Option<Decimal> {
    let per_entry: Vec<Decimal> = logs
        .iter()
        .filter_map(|entry| {
            entry
                .hours
                .or_else(|| entry.duration_minutes.map(|m| m / Decimal::from(60)))
        })
        .collect();
    if per_entry.is_empty() {
        return None;
    }
    Some(round_hours(per_entry.into_iter().sum()))
}

fn late_minutes_from_logs(logs: &[AttendanceLogEntry]) -> Option<Decimal> {
    let minutes: Vec<Decimal> = logs.iter().filter_map(|e| e.late_minutes).collect();
    if minutes.is_empty() {
        return None;
    }
    Some(minutes.into_iter().sum())
}

/// Groups log hours per ISO day into a `days` map the aggregator understands.
pub fn logs_to_days_payload(logs: &[AttendanceLogEntry]) -> Value {
    let mut per_day: BTreeMap<String, Decimal> = BTreeMap::new();
    for entry in logs {
        let Some(day) = entry.day() else {
            continue;
        };
        let hours = entry
            .hours
            .or_else(|| entry.duration_minutes.map(|m| m / Decimal::from(60)))
            .unwrap_or(Decimal::ZERO);
        *per_day.entry(day.to_string()).or_insert(Decimal::ZERO) += hours;
    }
    let days: serde_json::Map<String, Value> = per_day
        .into_iter()
        .map(|(day, hours)| (day, Value::String(round_hours(hours).to_string())))
        .collect();
    serde_json::json!({ "days": days })
}
