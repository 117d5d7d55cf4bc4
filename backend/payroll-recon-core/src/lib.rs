// src/lib.rs
//
// Payroll/attendance reconciliation core: probes the backend's candidate
// endpoints, normalizes whatever shapes come back and merges manual overrides
// onto the automatic computation.

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod http_client;
pub mod model;
pub mod month;
pub mod normalize;
pub mod overrides;
pub mod payroll_data;
pub mod resolver;

pub use cancel::{CancelToken, QueryTicket};
pub use config::ClientConfig;
pub use error::ReconError;
pub use http_client::{ApiClient, EnvToken, StaticToken, TokenChain, TokenProvider};
pub use model::{
    Adjustment, AdjustmentInput, AdjustmentKind, AttendanceLogEntry, DayRow, EmployeeRef,
    LateOverride, OverrideMode, PayrollFetch, PayrollMonth, PayrollSource,
};
pub use month::MonthRange;
pub use overrides::{LateEntry, OverrideAction, OverrideState};
pub use payroll_data::PayrollDataService;
pub use resolver::{ApiResponse, RequestDescriptor, Transport};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod normalize_tests;
