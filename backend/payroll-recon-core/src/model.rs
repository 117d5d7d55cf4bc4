// src/model.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// --- Employees and attendance ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRef {
    pub id: i64,
    /// Uppercased external identifier, if the backend exposes one.
    pub uid: Option<String>,
    pub code: Option<String>,
    pub branch: Option<String>,
    pub name: Option<String>,
}

impl EmployeeRef {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            uid: None,
            code: None,
            branch: None,
            name: None,
        }
    }

    pub fn with_uid<S: AsRef<str>>(mut self, uid: S) -> Self {
        self.uid = normalize_identifier(uid.as_ref());
        self
    }

    /// Identifier used by the `employee_uid` endpoint family: `uid`, else `code`.
    pub fn external_id(&self) -> Option<&str> {
        self.uid.as_deref().or(self.code.as_deref())
    }
}

pub(crate) fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// One clock event or shift as returned by the logs endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceLogEntry {
    pub timestamp: Option<String>,
    #[serde(rename = "in")]
    pub check_in: Option<String>,
    #[serde(rename = "out")]
    pub check_out: Option<String>,
    pub device: Option<String>,
    /// Explicit hours, or hours derived from the in/out pair.
    pub hours: Option<Decimal>,
    pub late: bool,
    pub late_minutes: Option<Decimal>,
    pub duration_minutes: Option<Decimal>,
}

impl AttendanceLogEntry {
    /// ISO day (`YYYY-MM-DD`) the entry belongs to, from the timestamp or check-in.
    pub fn day(&self) -> Option<&str> {
        [self.timestamp.as_deref(), self.check_in.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|s| s.get(..10))
            .find(|day| looks_like_iso_date(day))
    }
}

pub(crate) fn looks_like_iso_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

// --- Payroll ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRow {
    pub day: String,
    pub hours: Decimal,
    pub food_allowance: Decimal,
    pub other_allowance: Decimal,
    pub deductions: Decimal,
    pub late_penalty: Decimal,
    pub advance: Option<Decimal>,
}

impl DayRow {
    pub fn empty<S: Into<String>>(day: S) -> Self {
        Self {
            day: day.into(),
            hours: Decimal::ZERO,
            food_allowance: Decimal::ZERO,
            other_allowance: Decimal::ZERO,
            deductions: Decimal::ZERO,
            late_penalty: Decimal::ZERO,
            advance: None,
        }
    }

    pub fn with_hours<S: Into<String>>(day: S, hours: Decimal) -> Self {
        Self {
            hours,
            ..Self::empty(day)
        }
    }
}

/// Canonical per-employee-per-month payroll aggregate. Amounts are IQD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollMonth {
    pub month: String,
    pub from: String,
    pub to: String,
    pub hours_total: Decimal,
    pub late_minutes: Decimal,
    pub base_pay: Decimal,
    pub food_allowance: Decimal,
    pub other_allowance: Decimal,
    pub deductions: Decimal,
    pub late_penalty: Decimal,
    pub advances: Decimal,
    pub total_pay: Decimal,
    /// Set when the backend sent no total and `total_pay` was estimated locally.
    pub total_pay_estimated: bool,
    pub rows: Vec<DayRow>,
}

/// Where a reconciled payroll month came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayrollSource {
    Endpoint { path: String },
    /// Built from the employee record and raw logs because no payroll endpoint answered.
    ManualOverview,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollFetch {
    pub employee: EmployeeRef,
    pub payroll: PayrollMonth,
    pub source: PayrollSource,
}

// --- Manual adjustments ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Deduction,
    Advance,
}

impl AdjustmentKind {
    pub fn collection(&self) -> &'static str {
        match self {
            AdjustmentKind::Deduction => "deductions",
            AdjustmentKind::Advance => "advances",
        }
    }
}

/// A deduction or advance. Both share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Option<String>,
    pub kind: AdjustmentKind,
    pub date: Option<String>,
    pub month: Option<String>,
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: Option<String>,
    pub created_by: Option<String>,
}

pub type Deduction = Adjustment;
pub type Advance = Adjustment;

/// Write-side input for creating or updating an adjustment.
/// `reason` is accepted as an alias and folded into `note`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdjustmentInput {
    pub date: Option<String>,
    pub month: Option<String>,
    pub amount: Decimal,
    pub note: Option<String>,
    pub reason: Option<String>,
}

impl AdjustmentInput {
    pub fn canonical_note(&self) -> Option<String> {
        [self.note.as_deref(), self.reason.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// --- Late penalty overrides ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    Set,
    Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateOverride {
    pub id: Option<String>,
    pub employee_id: i64,
    pub date: String,
    pub mode: OverrideMode,
    pub amount_iqd: Decimal,
    pub note: String,
}

impl LateOverride {
    /// Final penalty once this override is applied on top of `auto_penalty`.
    pub fn apply_to(&self, auto_penalty: Decimal) -> Decimal {
        match self.mode {
            OverrideMode::Set => self.amount_iqd,
            OverrideMode::Delta => auto_penalty + self.amount_iqd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_employee_uid_is_uppercased() {
        let employee = EmployeeRef::new(7).with_uid("  emp-07 ");
        assert_eq!(employee.uid.as_deref(), Some("EMP-07"));
        assert_eq!(employee.external_id(), Some("EMP-07"));
        assert_eq!(EmployeeRef::new(7).with_uid("   ").uid, None);
    }

    #[test]
    fn test_log_entry_day() {
        let entry = AttendanceLogEntry {
            timestamp: Some("2024-03-05T08:02:11".to_string()),
            ..Default::default()
        };
        assert_eq!(entry.day(), Some("2024-03-05"));

        let entry = AttendanceLogEntry {
            timestamp: Some("yesterday".to_string()),
            check_in: Some("2024-03-06 07:59".to_string()),
            ..Default::default()
        };
        assert_eq!(entry.day(), Some("2024-03-06"));
        assert_eq!(AttendanceLogEntry::default().day(), None);
    }

    #[test]
    fn test_adjustment_reason_folds_into_note() {
        let input = AdjustmentInput {
            amount: dec!(25000),
            reason: Some("damaged tool".to_string()),
            ..Default::default()
        };
        assert_eq!(input.canonical_note().as_deref(), Some("damaged tool"));

        let input = AdjustmentInput {
            note: Some("from note".to_string()),
            reason: Some("from reason".to_string()),
            ..input
        };
        assert_eq!(input.canonical_note().as_deref(), Some("from note"));
    }

    #[test]
    fn test_override_modes() {
        let mut ovr = LateOverride {
            id: Some("1".to_string()),
            employee_id: 3,
            date: "2024-03-04".to_string(),
            mode: OverrideMode::Set,
            amount_iqd: dec!(3000),
            note: "late bus".to_string(),
        };
        assert_eq!(ovr.apply_to(dec!(5000)), dec!(3000));
        ovr.mode = OverrideMode::Delta;
        ovr.amount_iqd = dec!(-2000);
        assert_eq!(ovr.apply_to(dec!(5000)), dec!(3000));
    }
}
