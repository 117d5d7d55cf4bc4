// src/export.rs

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_decimal::Decimal;
use tracing::info;

use crate::error::{io_context, ReconError};
use crate::model::PayrollMonth;

const HEADER: [&str; 7] = [
    "day",
    "hours",
    "food_allowance",
    "other_allowance",
    "deductions",
    "late_penalty",
    "advance",
];

fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Writes one line per day row followed by a `TOTAL` line built from the
/// month's totals (not re-summed from the rows).
pub fn write_payroll_csv<W: Write>(writer: W, payroll: &PayrollMonth) -> Result<(), ReconError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for row in &payroll.rows {
        wtr.write_record([
            row.day.clone(),
            amount(row.hours),
            amount(row.food_allowance),
            amount(row.other_allowance),
            amount(row.deductions),
            amount(row.late_penalty),
            row.advance.map(amount).unwrap_or_default(),
        ])?;
    }

    wtr.write_record([
        "TOTAL".to_string(),
        amount(payroll.hours_total),
        amount(payroll.food_allowance),
        amount(payroll.other_allowance),
        amount(payroll.deductions),
        amount(payroll.late_penalty),
        amount(payroll.advances),
    ])?;

    wtr.flush()
        .map_err(|e| io_context(e, "Failed to flush payroll CSV"))?;
    Ok(())
}

pub fn export_payroll_csv(path: &Path, payroll: &PayrollMonth) -> Result<(), ReconError> {
    let file = File::create(path)
        .map_err(|e| io_context(e, format!("Failed to create CSV file: {:?}", path)))?;
    write_payroll_csv(file, payroll)?;
    info!("Wrote payroll for {} to {:?}", payroll.month, path);
    Ok(())
}
