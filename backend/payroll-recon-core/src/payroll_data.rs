// src/payroll_data.rs
use crate::aggregate::{aggregate, aggregate_with_logs, logs_to_days_payload};
use crate::cancel::CancelToken;
use crate::endpoints::{self, LogQuery};
use crate::error::ReconError;
use crate::http_client::ApiClient;
use crate::model::{
    looks_like_iso_date, Adjustment, AdjustmentInput, AdjustmentKind, AttendanceLogEntry,
    EmployeeRef, PayrollFetch, PayrollSource,
};
use crate::month::MonthRange;
use crate::normalize::{
    decimal_json, decode_adjustment, decode_adjustments, decode_employee, decode_log_entries,
    extract_record_id, unwrap_record,
};
use crate::overrides::{LateEntry, OverrideAction};
use crate::resolver::{resolve, resolve_accepting, ApiResponse, RequestDescriptor, Transport};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upper bound on log pages walked by `fetch_all_logs`.
pub const MAX_LOG_PAGES: u32 = 50;

const PAYROLL_WRAPPER_KEYS: [&str; 4] = ["data", "result", "items", "results"];
// Fields that only a month-level payroll record carries.
const PAYROLL_MARKER_KEYS: &[&str] = &[
    "month",
    "for_month",
    "period",
    "from",
    "to",
    "date_from",
    "date_to",
    "period_start",
    "period_end",
    "rows",
    "days",
    "details",
    "totals",
    "hours_total",
    "total_hours",
    "total_pay",
    "net_pay",
    "base_pay",
    "base_salary",
];
const ADJUSTMENT_WRAPPER_KEYS: [&str; 4] = ["deduction", "advance", "data", "item"];

#[derive(Clone)]
pub struct PayrollDataService {
    transport: Arc<dyn Transport>,
    logs_page_size: u32,
}

impl PayrollDataService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            logs_page_size: crate::config::DEFAULT_LOGS_PAGE_SIZE,
        }
    }

    pub fn from_client(client: ApiClient) -> Self {
        let logs_page_size = client.config().logs_page_size;
        Self::new(Arc::new(client)).with_logs_page_size(logs_page_size)
    }

    pub fn with_logs_page_size(mut self, page_size: u32) -> Self {
        self.logs_page_size = page_size.max(1);
        self
    }

    async fn resolve(
        &self,
        operation: &str,
        candidates: &[RequestDescriptor],
        cancel: &CancelToken,
    ) -> Result<ApiResponse, ReconError> {
        Ok(resolve(self.transport.as_ref(), operation, candidates, cancel)
            .await?
            .response)
    }

    // --- Employees ---

    pub async fn fetch_employee(
        &self,
        employee_id: i64,
        cancel: &CancelToken,
    ) -> Result<EmployeeRef, ReconError> {
        info!("Fetching employee {}...", employee_id);
        let resolved = resolve_accepting(
            self.transport.as_ref(),
            "fetch employee",
            &endpoints::employee(employee_id),
            cancel,
            |response| match decode_employee(&response.to_json()) {
                Some(_) => Ok(()),
                None => Err("payload has no employee id".to_string()),
            },
        )
        .await?;

        decode_employee(&resolved.response.to_json()).ok_or_else(|| ReconError::Mismatch {
            path: resolved.request.describe(),
            detail: "payload has no employee id".to_string(),
        })
    }

    // --- Payroll ---

    /// Fetches the employee record first (for the uid variants), then the month.
    /// If the employee lookup fails for any reason but cancellation, the payroll
    /// is probed by id only.
    pub async fn fetch_payroll_by_id(
        &self,
        employee_id: i64,
        month: &str,
        cancel: &CancelToken,
    ) -> Result<PayrollFetch, ReconError> {
        let employee = match self.fetch_employee(employee_id, cancel).await {
            Ok(employee) => employee,
            Err(ReconError::Cancelled) => return Err(ReconError::Cancelled),
            Err(e) => {
                warn!("Employee {} record unavailable, continuing by id: {}", employee_id, e);
                EmployeeRef::new(employee_id)
            }
        };
        self.fetch_payroll_month(&employee, month, cancel).await
    }

    /// Resolves the payroll month through the candidate list. Payloads for another
    /// month are skipped like a soft failure. When nothing answers with a matching
    /// payload, the month is rebuilt from the employee record and raw logs.
    pub async fn fetch_payroll_month(
        &self,
        employee: &EmployeeRef,
        month: &str,
        cancel: &CancelToken,
    ) -> Result<PayrollFetch, ReconError> {
        let range = MonthRange::parse(month)?;
        info!("Fetching payroll for employee {} ({})...", employee.id, range.month());

        let result = resolve_accepting(
            self.transport.as_ref(),
            "fetch payroll month",
            &endpoints::payroll_month(employee, &range),
            cancel,
            |response| match select_payroll(&response.to_json(), &range) {
                Some(_) => Ok(()),
                None => Err(format!("no payroll record for {}", range.month())),
            },
        )
        .await;

        match result {
            Ok(resolved) => {
                let raw =
                    select_payroll(&resolved.response.to_json(), &range).unwrap_or(Value::Null);
                Ok(PayrollFetch {
                    employee: employee.clone(),
                    payroll: aggregate(&raw, &range),
                    source: PayrollSource::Endpoint {
                        path: resolved.request.path,
                    },
                })
            }
            Err(e @ ReconError::NoVariantSucceeded { .. }) => {
                warn!(
                    "No payroll endpoint answered for employee {} ({}); \
                     building manual overview: {}",
                    employee.id,
                    range.month(),
                    e
                );
                self.manual_overview(employee, &range, cancel).await
            }
            Err(e) => {
                error!("Failed to fetch payroll for employee {}: {}", employee.id, e);
                Err(e)
            }
        }
    }

    /// Builds a month from the employee record and the raw log stream, fetched
    /// concurrently.
    pub async fn manual_overview(
        &self,
        employee: &EmployeeRef,
        range: &MonthRange,
        cancel: &CancelToken,
    ) -> Result<PayrollFetch, ReconError> {
        let (employee_result, logs_result) = tokio::join!(
            self.fetch_employee(employee.id, cancel),
            self.fetch_all_logs(employee.id, range, cancel)
        );

        let employee = match employee_result {
            Ok(fetched) => fetched,
            Err(e @ ReconError::NoVariantSucceeded { .. }) => {
                debug!("Keeping caller's employee record: {}", e);
                employee.clone()
            }
            Err(e) => return Err(e),
        };
        let logs = logs_result?;
        info!(
            "Manual overview for employee {} ({}) from {} log entries",
            employee.id,
            range.month(),
            logs.len()
        );

        let raw = logs_to_days_payload(&logs);
        Ok(PayrollFetch {
            employee,
            payroll: aggregate_with_logs(&raw, range, &logs),
            source: PayrollSource::ManualOverview,
        })
    }

    // --- Attendance logs ---

    pub async fn fetch_logs(
        &self,
        query: &LogQuery,
        cancel: &CancelToken,
    ) -> Result<Vec<AttendanceLogEntry>, ReconError> {
        let response = self
            .resolve("fetch logs", &endpoints::logs(query), cancel)
            .await?;
        Ok(decode_log_entries(&response.to_json()))
    }

    /// Walks log pages until a short page, a repeated page, or `MAX_LOG_PAGES`.
    pub async fn fetch_all_logs(
        &self,
        employee_id: i64,
        range: &MonthRange,
        cancel: &CancelToken,
    ) -> Result<Vec<AttendanceLogEntry>, ReconError> {
        info!("Fetching all logs for employee {} ({})...", employee_id, range.month());
        let mut all_logs: Vec<AttendanceLogEntry> = Vec::new();
        let mut previous_page: Option<Vec<AttendanceLogEntry>> = None;
        let mut current_page = 1;

        loop {
            let query = LogQuery {
                page: Some(current_page),
                page_size: Some(self.logs_page_size),
                ..LogQuery::for_range(employee_id, range)
            };
            let entries = self.fetch_logs(&query, cancel).await?;
            let fetched_count = entries.len();
            debug!("Fetched {} log entries on page {}", fetched_count, current_page);

            if previous_page.as_ref() == Some(&entries) && fetched_count > 0 {
                warn!(
                    "Logs page {} repeats the previous page; backend ignores paging",
                    current_page
                );
                break;
            }
            all_logs.extend(entries.iter().cloned());

            if fetched_count < self.logs_page_size as usize {
                break;
            }
            if current_page >= MAX_LOG_PAGES {
                warn!("Stopped after {} log pages for employee {}", MAX_LOG_PAGES, employee_id);
                break;
            }
            previous_page = Some(entries);
            current_page += 1;
        }
        info!("Finished fetching {} total log entries.", all_logs.len());
        Ok(all_logs)
    }

    // --- Deductions and advances ---

    pub async fn fetch_adjustments(
        &self,
        kind: AdjustmentKind,
        employee_id: i64,
        month: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<Adjustment>, ReconError> {
        let month = month
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(MonthRange::parse)
            .transpose()?
            .map(|range| range.month());
        let operation = format!("fetch {}", kind.collection());
        let response = self
            .resolve(
                &operation,
                &endpoints::adjustments_list(kind, employee_id, month.as_deref()),
                cancel,
            )
            .await?;
        Ok(decode_adjustments(&response.to_json(), kind))
    }

    pub async fn fetch_deductions(
        &self,
        employee_id: i64,
        month: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<Adjustment>, ReconError> {
        self.fetch_adjustments(AdjustmentKind::Deduction, employee_id, month, cancel)
            .await
    }

    pub async fn fetch_advances(
        &self,
        employee_id: i64,
        month: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<Adjustment>, ReconError> {
        self.fetch_adjustments(AdjustmentKind::Advance, employee_id, month, cancel)
            .await
    }

    pub async fn create_adjustment(
        &self,
        kind: AdjustmentKind,
        employee_id: i64,
        input: &AdjustmentInput,
        cancel: &CancelToken,
    ) -> Result<Adjustment, ReconError> {
        let body = adjustment_body(input)?;
        let operation = format!("create {}", kind.collection());
        let response = self
            .resolve(
                &operation,
                &endpoints::adjustment_create(kind, employee_id, &body),
                cancel,
            )
            .await?;
        Ok(written_adjustment(&response, kind, &body, None))
    }

    pub async fn update_adjustment(
        &self,
        kind: AdjustmentKind,
        employee_id: i64,
        id: &str,
        input: &AdjustmentInput,
        cancel: &CancelToken,
    ) -> Result<Adjustment, ReconError> {
        let body = adjustment_body(input)?;
        let operation = format!("update {}", kind.collection());
        let response = self
            .resolve(
                &operation,
                &endpoints::adjustment_update(kind, employee_id, id, &body),
                cancel,
            )
            .await?;
        Ok(written_adjustment(&response, kind, &body, Some(id)))
    }

    pub async fn delete_adjustment(
        &self,
        kind: AdjustmentKind,
        employee_id: i64,
        id: &str,
        cancel: &CancelToken,
    ) -> Result<(), ReconError> {
        let operation = format!("delete {}", kind.collection());
        self.resolve(
            &operation,
            &endpoints::adjustment_delete(kind, employee_id, id),
            cancel,
        )
        .await?;
        info!("Deleted {} {} for employee {}", kind.collection(), id, employee_id);
        Ok(())
    }

    // --- Late penalty overrides ---

    /// Makes the final penalty of `entry` equal to `desired`. The reason is checked
    /// before any request is issued.
    pub async fn save_late_override(
        &self,
        entry: &LateEntry,
        desired: Decimal,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<LateEntry, ReconError> {
        let action = entry.plan_save(desired, reason)?;
        self.execute_override(entry, action, cancel).await
    }

    /// Removes the override on `entry`, returning it to the automatic penalty.
    pub async fn delete_late_override(
        &self,
        entry: &LateEntry,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<LateEntry, ReconError> {
        let action = entry.plan_delete(reason)?;
        self.execute_override(entry, action, cancel).await
    }

    async fn execute_override(
        &self,
        entry: &LateEntry,
        action: OverrideAction,
        cancel: &CancelToken,
    ) -> Result<LateEntry, ReconError> {
        let payload = action.payload().unwrap_or(Value::Null);
        let (operation, candidates) = match &action {
            OverrideAction::Noop => {
                debug!(
                    "Late penalty for employee {} on {} already at requested value",
                    entry.employee_id, entry.date
                );
                return Ok(entry.clone());
            }
            OverrideAction::Create { .. } => (
                "create late override",
                endpoints::late_override_create(&payload),
            ),
            OverrideAction::Update { id, .. } => (
                "update late override",
                endpoints::late_override_update(id, &payload),
            ),
            OverrideAction::Delete { id, reason } => (
                "delete late override",
                endpoints::late_override_delete(id, reason),
            ),
        };

        let resolved = resolve(self.transport.as_ref(), operation, &candidates, cancel).await?;
        let created_id = match &action {
            OverrideAction::Create { .. } => {
                let id = extract_record_id(&resolved.response.to_json());
                if id.is_none() {
                    error!("Backend returned no id for the new late override on {}", entry.date);
                    return Err(ReconError::Mismatch {
                        path: resolved.request.describe(),
                        detail: "created late override carries no id".to_string(),
                    });
                }
                id
            }
            _ => None,
        };

        let mut updated = entry.clone();
        updated.apply(&action, created_id);
        info!(
            "{} for employee {} on {}: final penalty {}",
            operation,
            updated.employee_id,
            updated.date,
            updated.final_penalty()
        );
        Ok(updated)
    }
}

// --- Helpers ---

/// Picks the payroll object for `range` out of a response. An object with its
/// own payroll fields is the record itself; only `payroll`, or a list of
/// payroll-shaped objects under a generic wrapper, is unwrapped.
fn select_payroll(payload: &Value, range: &MonthRange) -> Option<Value> {
    match payload {
        Value::Array(records) => pick_record(records, range),
        Value::Object(map) => {
            match map.get("payroll") {
                Some(inner @ Value::Object(_)) => {
                    return range.matches(inner).then(|| inner.clone())
                }
                Some(Value::Array(records)) => return pick_record(records, range),
                _ => {}
            }
            if looks_like_payroll(payload) {
                return range.matches(payload).then(|| payload.clone());
            }
            for key in PAYROLL_WRAPPER_KEYS {
                match map.get(key) {
                    Some(inner @ Value::Object(_)) => {
                        return range.matches(inner).then(|| inner.clone())
                    }
                    Some(Value::Array(records)) => return pick_record(records, range),
                    _ => {}
                }
            }
            range.matches(payload).then(|| payload.clone())
        }
        _ => None,
    }
}

fn looks_like_payroll(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| PAYROLL_MARKER_KEYS.iter().any(|key| map.contains_key(*key)))
        .unwrap_or(false)
}

// Bare day rows under a wrapper are not payroll records.
fn pick_record(records: &[Value], range: &MonthRange) -> Option<Value> {
    records
        .iter()
        .filter(|record| looks_like_payroll(record))
        .find(|record| range.matches(record))
        .cloned()
}

/// Validates an adjustment input and builds its request body. Only `note` is sent.
fn adjustment_body(input: &AdjustmentInput) -> Result<Value, ReconError> {
    if input.amount.is_zero() {
        return Err(ReconError::validation("Adjustment amount must be non-zero"));
    }
    let date = input.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let month = input.month.as_deref().map(str::trim).filter(|m| !m.is_empty());
    if date.is_none() && month.is_none() {
        return Err(ReconError::validation("Adjustment needs a date or a month"));
    }

    let mut body = Map::new();
    body.insert("amount".to_string(), decimal_json(input.amount));
    if let Some(date) = date {
        if !looks_like_iso_date(date) {
            return Err(ReconError::validation(format!(
                "Adjustment date '{}' is not YYYY-MM-DD",
                date
            )));
        }
        body.insert("date".to_string(), json!(date));
    }
    if let Some(month) = month {
        body.insert("month".to_string(), json!(MonthRange::parse(month)?.month()));
    }
    if let Some(note) = input.canonical_note() {
        body.insert("note".to_string(), json!(note));
    }
    Ok(Value::Object(body))
}

/// The sent body overlaid with whatever record the backend echoed back.
fn written_adjustment(
    response: &ApiResponse,
    kind: AdjustmentKind,
    sent: &Value,
    id: Option<&str>,
) -> Adjustment {
    let returned = response.to_json();
    let mut merged = sent.clone();
    if let (Value::Object(target), Value::Object(fields)) =
        (&mut merged, unwrap_record(&returned, &ADJUSTMENT_WRAPPER_KEYS))
    {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    let mut adjustment = decode_adjustment(&merged, kind);
    if adjustment.id.is_none() {
        adjustment.id = id.map(str::to_string);
    }
    adjustment
}
