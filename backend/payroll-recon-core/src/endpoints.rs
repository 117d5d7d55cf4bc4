// src/endpoints.rs
//
// Candidate request lists per logical operation. Each function is pure: it only
// decides which URL shapes to probe and in what order. `resolver::resolve` does
// the probing.

use serde_json::Value;

use crate::model::{AdjustmentKind, EmployeeRef};
use crate::month::MonthRange;
use crate::resolver::RequestDescriptor;

/// Query for the attendance log endpoints. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQuery {
    pub employee_id: Option<i64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<String>,
}

impl LogQuery {
    pub fn for_range(employee_id: i64, range: &MonthRange) -> Self {
        Self {
            employee_id: Some(employee_id),
            date_from: Some(range.from()),
            date_to: Some(range.to()),
            sort: Some("timestamp".to_string()),
            ..Self::default()
        }
    }

    fn apply(&self, request: RequestDescriptor) -> RequestDescriptor {
        request
            .param("employee_id", self.employee_id)
            .param("date_from", self.date_from.as_deref())
            .param("date_to", self.date_to.as_deref())
            .param("page", self.page)
            .param("page_size", self.page_size)
            .param("sort", self.sort.as_deref())
    }
}

/// Each base request followed by its `/api`-prefixed twin.
fn with_api_variants(bases: Vec<RequestDescriptor>) -> Vec<RequestDescriptor> {
    bases
        .into_iter()
        .flat_map(|base| {
            let prefixed = base.api_prefixed();
            [base, prefixed]
        })
        .collect()
}

pub fn payroll_month(employee: &EmployeeRef, range: &MonthRange) -> Vec<RequestDescriptor> {
    let month = range.month();
    let uid = employee.external_id();
    let mut bases = vec![RequestDescriptor::get("/employee_files/payroll")
        .param("employee_id", Some(employee.id))
        .param("month", Some(&month))];

    // uid variants are skipped when the employee has no external id; without it the
    // query would not identify anyone.
    if let Some(uid) = uid {
        bases.push(
            RequestDescriptor::get("/payroll")
                .param("employee_uid", Some(uid))
                .param("from", Some(range.from()))
                .param("to", Some(range.to())),
        );
    }
    bases.push(
        RequestDescriptor::get("/payroll")
            .param("employee_id", Some(employee.id))
            .param("from", Some(range.from()))
            .param("to", Some(range.to())),
    );
    if let Some(uid) = uid {
        bases.push(
            RequestDescriptor::get("/payroll")
                .param("employee_uid", Some(uid))
                .param("month", Some(&month)),
        );
    }
    bases.push(
        RequestDescriptor::get("/payroll")
            .param("employee_id", Some(employee.id))
            .param("month", Some(&month)),
    );
    with_api_variants(bases)
}

pub fn employee(employee_id: i64) -> Vec<RequestDescriptor> {
    with_api_variants(vec![
        RequestDescriptor::get(format!("/employee_files/{}", employee_id)),
        RequestDescriptor::get(format!("/employees/{}", employee_id)),
    ])
}

pub fn adjustments_list(
    kind: AdjustmentKind,
    employee_id: i64,
    month: Option<&str>,
) -> Vec<RequestDescriptor> {
    let collection = kind.collection();
    with_api_variants(vec![
        RequestDescriptor::get(format!("/employee_files/{}/{}", employee_id, collection))
            .param("month", month),
        RequestDescriptor::get(format!("/payroll/{}", collection))
            .param("employee_id", Some(employee_id))
            .param("month", month),
    ])
}

fn adjustment_paths(kind: AdjustmentKind, employee_id: i64, id: Option<&str>) -> [String; 2] {
    let collection = kind.collection();
    let suffix = id.map(|id| format!("/{}", id)).unwrap_or_default();
    [
        format!("/employee_files/{}/{}{}", employee_id, collection, suffix),
        format!("/employees/{}/{}{}", employee_id, collection, suffix),
    ]
}

pub fn adjustment_create(
    kind: AdjustmentKind,
    employee_id: i64,
    body: &Value,
) -> Vec<RequestDescriptor> {
    with_api_variants(
        adjustment_paths(kind, employee_id, None)
            .into_iter()
            .map(|path| RequestDescriptor::post(path, body.clone()))
            .collect(),
    )
}

pub fn adjustment_update(
    kind: AdjustmentKind,
    employee_id: i64,
    id: &str,
    body: &Value,
) -> Vec<RequestDescriptor> {
    with_api_variants(
        adjustment_paths(kind, employee_id, Some(id))
            .into_iter()
            .map(|path| RequestDescriptor::put(path, body.clone()))
            .collect(),
    )
}

pub fn adjustment_delete(
    kind: AdjustmentKind,
    employee_id: i64,
    id: &str,
) -> Vec<RequestDescriptor> {
    with_api_variants(
        adjustment_paths(kind, employee_id, Some(id))
            .into_iter()
            .map(RequestDescriptor::delete)
            .collect(),
    )
}

pub fn late_override_create(body: &Value) -> Vec<RequestDescriptor> {
    with_api_variants(vec![RequestDescriptor::post(
        "/payroll/late_override",
        body.clone(),
    )])
}

pub fn late_override_update(id: &str, body: &Value) -> Vec<RequestDescriptor> {
    with_api_variants(vec![RequestDescriptor::put(
        format!("/payroll/late_override/{}", id),
        body.clone(),
    )])
}

pub fn late_override_delete(id: &str, reason: &str) -> Vec<RequestDescriptor> {
    with_api_variants(vec![RequestDescriptor::delete(format!(
        "/payroll/late_override/{}",
        id
    ))
    .param("reason", Some(reason))])
}

pub fn logs(query: &LogQuery) -> Vec<RequestDescriptor> {
    ["/employee_files/logs", "/logs", "/api/employee_files/logs", "/api/logs"]
        .into_iter()
        .map(|path| query.apply(RequestDescriptor::get(path)))
        .collect()
}
