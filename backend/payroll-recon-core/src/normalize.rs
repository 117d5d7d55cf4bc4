// src/normalize.rs
//
// Turns whatever JSON the backend returns into canonical records. Nothing in here
// fails: unknown shapes degrade to empty sequences and missing numbers to zero.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{
    normalize_identifier, Adjustment, AdjustmentKind, AttendanceLogEntry, DayRow, EmployeeRef,
};

/// Wrapper properties checked, in order, before falling back to the first array property.
const LIST_WRAPPER_KEYS: [&str; 3] = ["items", "data", "results"];

// --- Alias tables ---
// Canonical key first; legacy short keys after it so the canonical key wins.

const ROW_DAY_KEYS: &[&str] = &["day", "date", "work_date"];
const ROW_HOURS_KEYS: &[&str] = &["hours", "hours_worked", "worked_hours"];
const ROW_FOOD_KEYS: &[&str] = &["food_allowance", "food"];
const ROW_OTHER_KEYS: &[&str] = &["other_allowance", "other"];
const ROW_DEDUCTION_KEYS: &[&str] = &["deductions", "deduct"];
const ROW_LATE_KEYS: &[&str] = &["late_penalty", "late"];
const ROW_ADVANCE_KEYS: &[&str] = &["advance", "advances"];

const LOG_TIMESTAMP_KEYS: &[&str] = &["timestamp", "ts", "time", "datetime", "date"];
const LOG_IN_KEYS: &[&str] = &["in", "check_in", "clock_in", "time_in"];
const LOG_OUT_KEYS: &[&str] = &["out", "check_out", "clock_out", "time_out"];
const LOG_DEVICE_KEYS: &[&str] = &["device", "device_name", "terminal", "device.name"];
const LOG_HOURS_KEYS: &[&str] = &["hours", "worked_hours"];
const LOG_DURATION_KEYS: &[&str] = &["duration_minutes", "minutes", "duration"];
const LOG_LATE_KEYS: &[&str] = &["late", "is_late"];
const LOG_LATE_MINUTES_KEYS: &[&str] = &["late_minutes", "minutes_late"];

const ID_KEYS: &[&str] = &["id", "override.id", "data.id", "item.id"];

// --- Shape normalization ---

/// Extracts the record list from a payload: the payload itself if it is an array,
/// else `items`, `data`, `results`, else the first array-valued property, else empty.
pub fn to_record_array(payload: &Value) -> Vec<Value> {
    let map = match payload {
        Value::Array(items) => return items.clone(),
        Value::Object(map) => map,
        _ => return Vec::new(),
    };

    for key in LIST_WRAPPER_KEYS {
        if let Some(Value::Array(items)) = map.get(key) {
            return items.clone();
        }
    }

    match map.values().find_map(Value::as_array) {
        Some(items) => items.clone(),
        None => {
            debug!("Payload has no array-valued property; treating as empty list");
            Vec::new()
        }
    }
}

/// Flattens a day-keyed map into rows sorted by key. Values are either plain hours
/// or per-day objects carrying the same fields as a row.
pub fn days_map_to_rows(map: &Map<String, Value>) -> Vec<DayRow> {
    let mut rows: Vec<DayRow> = map
        .iter()
        .map(|(day, value)| match value {
            Value::Object(_) => decode_day_row_labelled(value, day.clone()),
            other => DayRow::with_hours(day.clone(), decimal_of(other).unwrap_or(Decimal::ZERO)),
        })
        .collect();
    rows.sort_by(|a, b| a.day.cmp(&b.day));
    rows
}

/// Returns the object nested under the first matching wrapper key, or the payload itself.
/// Arrays yield their first element.
pub fn unwrap_record<'a>(payload: &'a Value, wrapper_keys: &[&str]) -> &'a Value {
    if let Value::Array(items) = payload {
        return items.first().unwrap_or(payload);
    }
    wrapper_keys
        .iter()
        .filter_map(|key| payload.get(*key))
        .find(|v| v.is_object())
        .unwrap_or(payload)
}

// --- Field access ---

/// Follows a dotted path (`totals.hours`) through nested objects.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, key| current.as_object()?.get(key))
}

/// Numeric coercion: JSON numbers and numeric strings. Everything else is `None`.
pub fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// First alias in `paths` that holds a number.
pub fn first_decimal(record: &Value, paths: &[&str]) -> Option<Decimal> {
    paths
        .iter()
        .find_map(|path| lookup(record, path).and_then(decimal_of))
}

pub fn decimal_or_zero(record: &Value, paths: &[&str]) -> Decimal {
    first_decimal(record, paths).unwrap_or(Decimal::ZERO)
}

/// First alias holding a non-empty string (numbers are stringified).
pub fn first_string(record: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(record, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn first_bool(record: &Value, paths: &[&str]) -> Option<bool> {
    paths.iter().find_map(|path| match lookup(record, path)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub fn round_hours(hours: Decimal) -> Decimal {
    hours.round_dp(2)
}

/// JSON number for an outgoing amount; integers stay integers.
pub fn decimal_json(amount: Decimal) -> Value {
    let amount = amount.normalize();
    if amount.scale() == 0 {
        if let Some(i) = amount.to_i64() {
            return Value::from(i);
        }
    }
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(amount.to_string()))
}

/// Id of a freshly written record, from the record itself or a common wrapper.
pub fn extract_record_id(payload: &Value) -> Option<String> {
    first_string(payload, ID_KEYS)
}

// --- Record decoders ---

/// Decodes one per-day row; `None` when the row carries no day label.
pub fn decode_day_row(record: &Value) -> Option<DayRow> {
    let day = first_string(record, ROW_DAY_KEYS)?;
    Some(decode_day_row_labelled(record, day))
}

fn decode_day_row_labelled(record: &Value, day: String) -> DayRow {
    let hours = first_decimal(record, ROW_HOURS_KEYS)
        .or_else(|| {
            first_decimal(record, LOG_DURATION_KEYS).map(|m| round_hours(m / Decimal::from(60)))
        })
        .unwrap_or(Decimal::ZERO);
    DayRow {
        day,
        hours,
        food_allowance: decimal_or_zero(record, ROW_FOOD_KEYS),
        other_allowance: decimal_or_zero(record, ROW_OTHER_KEYS),
        deductions: decimal_or_zero(record, ROW_DEDUCTION_KEYS),
        late_penalty: decimal_or_zero(record, ROW_LATE_KEYS),
        advance: first_decimal(record, ROW_ADVANCE_KEYS),
    }
}

pub fn decode_log_entry(record: &Value) -> AttendanceLogEntry {
    let check_in = first_string(record, LOG_IN_KEYS);
    let check_out = first_string(record, LOG_OUT_KEYS);
    let hours = first_decimal(record, LOG_HOURS_KEYS).or_else(|| match (&check_in, &check_out) {
        (Some(start), Some(end)) => hours_between(start, end),
        _ => None,
    });

    AttendanceLogEntry {
        timestamp: first_string(record, LOG_TIMESTAMP_KEYS),
        check_in,
        check_out,
        device: first_string(record, LOG_DEVICE_KEYS),
        hours,
        late: first_bool(record, LOG_LATE_KEYS).unwrap_or(false),
        late_minutes: first_decimal(record, LOG_LATE_MINUTES_KEYS),
        duration_minutes: first_decimal(record, LOG_DURATION_KEYS),
    }
}

pub fn decode_log_entries(payload: &Value) -> Vec<AttendanceLogEntry> {
    to_record_array(payload)
        .iter()
        .map(decode_log_entry)
        .collect()
}

/// Decodes an employee record; `None` if no numeric id can be found.
pub fn decode_employee(payload: &Value) -> Option<EmployeeRef> {
    let record = unwrap_record(payload, &["employee", "data", "item"]);
    let id = first_decimal(record, &["id", "employee_id"])?.to_i64()?;
    Some(EmployeeRef {
        id,
        uid: first_string(record, &["uid", "employee_uid"]).and_then(|s| normalize_identifier(&s)),
        code: first_string(record, &["code", "employee_code"])
            .and_then(|s| normalize_identifier(&s)),
        branch: first_string(record, &["branch", "branch_name", "branch.name"]),
        name: first_string(record, &["name", "full_name"]),
    })
}

pub fn decode_adjustment(record: &Value, kind: AdjustmentKind) -> Adjustment {
    Adjustment {
        id: first_string(record, &["id", "deduction_id", "advance_id"]),
        kind,
        date: first_string(record, &["date", "day"]),
        month: first_string(record, &["month", "for_month"]),
        amount: decimal_or_zero(record, &["amount", "amount_iqd", "value"]),
        note: first_string(record, &["note", "reason", "comment"]),
        created_at: first_string(record, &["created_at", "createdAt"]),
        created_by: first_string(
            record,
            &["created_by", "createdBy", "created_by_name", "created_by.name"],
        ),
    }
}

pub fn decode_adjustments(payload: &Value, kind: AdjustmentKind) -> Vec<Adjustment> {
    to_record_array(payload)
        .iter()
        .map(|record| decode_adjustment(record, kind))
        .collect()
}

// --- Clock arithmetic ---

enum ClockValue {
    At(NaiveDateTime),
    Time(NaiveTime),
}

impl ClockValue {
    fn time(&self) -> NaiveTime {
        match self {
            ClockValue::At(at) => at.time(),
            ClockValue::Time(t) => *t,
        }
    }
}

fn parse_clock(raw: &str) -> Option<ClockValue> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(ClockValue::At(at.naive_local()));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ClockValue::At(at));
        }
    }
    for format in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, format) {
            return Some(ClockValue::Time(t));
        }
    }
    None
}

/// Hours between two clock readings, rounded to 2 dp. Bare times that wrap past
/// midnight count as an overnight shift.
pub fn hours_between(start: &str, end: &str) -> Option<Decimal> {
    let minutes = match (parse_clock(start)?, parse_clock(end)?) {
        (ClockValue::At(a), ClockValue::At(b)) => (b - a).num_minutes(),
        (a, b) => {
            let m = (b.time() - a.time()).num_minutes();
            if m < 0 {
                m + 24 * 60
            } else {
                m
            }
        }
    };
    if minutes <= 0 {
        return None;
    }
    Some(round_hours(Decimal::from(minutes) / Decimal::from(60)))
}
