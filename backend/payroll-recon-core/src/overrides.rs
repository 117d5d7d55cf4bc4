// src/overrides.rs
//
// Late-penalty override state per (employee, date). Planning is pure; the data
// service executes the planned action against the backend and then applies it.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::ReconError;
use crate::model::{LateOverride, OverrideMode};
use crate::normalize::decimal_json;

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideState {
    /// No override; the automatic penalty governs.
    Automatic,
    Overridden(LateOverride),
}

/// One late-penalty line: the backend's automatic penalty plus any override.
#[derive(Debug, Clone, PartialEq)]
pub struct LateEntry {
    pub employee_id: i64,
    pub date: String,
    pub auto_penalty: Decimal,
    pub state: OverrideState,
}

/// Write the reconciler wants issued. Only `set`-mode overrides are ever written.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideAction {
    Noop,
    Create {
        employee_id: i64,
        date: String,
        amount_iqd: Decimal,
        note: String,
    },
    Update {
        id: String,
        amount_iqd: Decimal,
        note: String,
    },
    Delete {
        id: String,
        reason: String,
    },
}

impl OverrideAction {
    pub fn is_write(&self) -> bool {
        !matches!(self, OverrideAction::Noop)
    }

    /// JSON body for create/update. Deletes carry the reason in the query string instead.
    pub fn payload(&self) -> Option<Value> {
        match self {
            OverrideAction::Create {
                employee_id,
                date,
                amount_iqd,
                note,
            } => Some(json!({
                "employee_id": employee_id,
                "date": date,
                "mode": "set",
                "amount_iqd": decimal_json(*amount_iqd),
                "note": note,
            })),
            OverrideAction::Update {
                amount_iqd, note, ..
            } => Some(json!({
                "mode": "set",
                "amount_iqd": decimal_json(*amount_iqd),
                "note": note,
            })),
            OverrideAction::Noop | OverrideAction::Delete { .. } => None,
        }
    }
}

fn require_reason(reason: &str) -> Result<String, ReconError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ReconError::validation(
            "A reason is required to change a late penalty",
        ));
    }
    Ok(trimmed.to_string())
}

impl LateEntry {
    pub fn automatic<S: Into<String>>(employee_id: i64, date: S, auto_penalty: Decimal) -> Self {
        Self {
            employee_id,
            date: date.into(),
            auto_penalty,
            state: OverrideState::Automatic,
        }
    }

    pub fn with_override(mut self, existing: LateOverride) -> Self {
        self.state = OverrideState::Overridden(existing);
        self
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self.state, OverrideState::Overridden(_))
    }

    pub fn current_override(&self) -> Option<&LateOverride> {
        match &self.state {
            OverrideState::Overridden(o) => Some(o),
            OverrideState::Automatic => None,
        }
    }

    /// Penalty in effect: the override's result when present, else the automatic one.
    pub fn final_penalty(&self) -> Decimal {
        match &self.state {
            OverrideState::Automatic => self.auto_penalty,
            OverrideState::Overridden(o) => o.apply_to(self.auto_penalty),
        }
    }

    /// Plans the write for "make the final penalty `desired`".
    ///
    /// Saving the automatic value removes an existing override instead of
    /// storing a redundant one. The reason is validated before anything else.
    pub fn plan_save(&self, desired: Decimal, reason: &str) -> Result<OverrideAction, ReconError> {
        let note = require_reason(reason)?;
        if desired < Decimal::ZERO {
            return Err(ReconError::validation(format!(
                "Late penalty cannot be negative (got {})",
                desired
            )));
        }

        match &self.state {
            OverrideState::Automatic if desired == self.auto_penalty => Ok(OverrideAction::Noop),
            OverrideState::Automatic => Ok(OverrideAction::Create {
                employee_id: self.employee_id,
                date: self.date.clone(),
                amount_iqd: desired,
                note,
            }),
            OverrideState::Overridden(existing) if desired == self.auto_penalty => {
                match &existing.id {
                    Some(id) => Ok(OverrideAction::Delete {
                        id: id.clone(),
                        reason: note,
                    }),
                    None => Err(ReconError::validation(format!(
                        "Override for employee {} on {} has no id and cannot be removed",
                        self.employee_id, self.date
                    ))),
                }
            }
            OverrideState::Overridden(existing) => match &existing.id {
                Some(id) => Ok(OverrideAction::Update {
                    id: id.clone(),
                    amount_iqd: desired,
                    note,
                }),
                None => Ok(OverrideAction::Create {
                    employee_id: self.employee_id,
                    date: self.date.clone(),
                    amount_iqd: desired,
                    note,
                }),
            },
        }
    }

    /// Plans an explicit return to the automatic penalty.
    pub fn plan_delete(&self, reason: &str) -> Result<OverrideAction, ReconError> {
        let reason = require_reason(reason)?;
        match &self.state {
            OverrideState::Automatic => Ok(OverrideAction::Noop),
            OverrideState::Overridden(existing) => match &existing.id {
                Some(id) => Ok(OverrideAction::Delete {
                    id: id.clone(),
                    reason,
                }),
                None => Err(ReconError::validation(format!(
                    "Override for employee {} on {} has no id and cannot be removed",
                    self.employee_id, self.date
                ))),
            },
        }
    }

    /// Moves the entry to the state implied by a completed action.
    /// `created_id` is the id the backend assigned on create, if it returned one.
    pub fn apply(&mut self, action: &OverrideAction, created_id: Option<String>) {
        match action {
            OverrideAction::Noop => {}
            OverrideAction::Create {
                amount_iqd, note, ..
            } => {
                self.state = OverrideState::Overridden(LateOverride {
                    id: created_id,
                    employee_id: self.employee_id,
                    date: self.date.clone(),
                    mode: OverrideMode::Set,
                    amount_iqd: *amount_iqd,
                    note: note.clone(),
                });
            }
            OverrideAction::Update {
                amount_iqd, note, ..
            } => {
                if let OverrideState::Overridden(existing) = &mut self.state {
                    existing.mode = OverrideMode::Set;
                    existing.amount_iqd = *amount_iqd;
                    existing.note = note.clone();
                }
            }
            OverrideAction::Delete { .. } => self.state = OverrideState::Automatic,
        }
    }
}
