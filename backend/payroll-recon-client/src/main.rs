// src/main.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use payroll_recon_core::endpoints::LogQuery;
use payroll_recon_core::export::export_payroll_csv;
use payroll_recon_core::{
    AdjustmentInput, AdjustmentKind, ApiClient, CancelToken, ClientConfig, LateEntry,
    LateOverride, OverrideMode, PayrollDataService,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "payroll-recon")]
#[command(about = "Fetch, reconcile and amend payroll data from the HR backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconciled payroll month for one employee
    Payroll {
        #[arg(long, short = 'e')]
        employee: i64,

        /// Month as YYYY-MM (defaults to the current month)
        #[arg(long, short = 'm')]
        month: Option<String>,

        /// Also write the day rows and totals to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Raw attendance logs, normalized
    Logs {
        #[arg(long, short = 'e')]
        employee: i64,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Fetch a single page of the `--from`/`--to` window
        #[arg(long)]
        page: Option<u32>,

        /// Walk every page of this month (YYYY-MM)
        #[arg(long, short = 'm', conflicts_with_all = ["from", "to", "page"])]
        month: Option<String>,
    },

    /// List or change deductions
    Deductions(AdjustmentArgs),

    /// List or change salary advances
    Advances(AdjustmentArgs),

    /// Set the final late penalty for one day (removes the override if equal to auto)
    LateSet {
        #[command(flatten)]
        day: LateDayArgs,

        /// Desired final penalty in IQD
        #[arg(long)]
        amount: Decimal,

        #[arg(long)]
        reason: String,
    },

    /// Remove a late penalty override, returning to the automatic value
    LateDelete {
        #[command(flatten)]
        day: LateDayArgs,

        #[arg(long)]
        reason: String,
    },
}

#[derive(Args)]
struct AdjustmentArgs {
    #[command(subcommand)]
    action: AdjustmentAction,
}

#[derive(Subcommand)]
enum AdjustmentAction {
    List {
        #[arg(long, short = 'e')]
        employee: i64,

        #[arg(long, short = 'm')]
        month: Option<String>,
    },
    Add {
        #[arg(long, short = 'e')]
        employee: i64,

        #[command(flatten)]
        fields: AdjustmentFields,
    },
    Update {
        #[arg(long, short = 'e')]
        employee: i64,

        id: String,

        #[command(flatten)]
        fields: AdjustmentFields,
    },
    Delete {
        #[arg(long, short = 'e')]
        employee: i64,

        id: String,
    },
}

#[derive(Args)]
struct AdjustmentFields {
    /// Signed amount in IQD
    #[arg(long, allow_hyphen_values = true)]
    amount: Decimal,

    #[arg(long)]
    date: Option<String>,

    #[arg(long, short = 'm')]
    month: Option<String>,

    #[arg(long)]
    note: Option<String>,

    /// Synonym for --note
    #[arg(long)]
    reason: Option<String>,
}

impl From<AdjustmentFields> for AdjustmentInput {
    fn from(fields: AdjustmentFields) -> Self {
        AdjustmentInput {
            date: fields.date,
            month: fields.month,
            amount: fields.amount,
            note: fields.note,
            reason: fields.reason,
        }
    }
}

#[derive(Args)]
struct LateDayArgs {
    #[arg(long, short = 'e')]
    employee: i64,

    /// Day as YYYY-MM-DD
    #[arg(long)]
    date: String,

    /// Automatic penalty computed by the backend for that day
    #[arg(long)]
    auto: Decimal,

    /// Id of the override currently stored for that day, if any
    #[arg(long)]
    override_id: Option<String>,

    /// Amount of the current override (set mode)
    #[arg(long, requires = "override_id")]
    override_amount: Option<Decimal>,
}

impl LateDayArgs {
    fn entry(&self) -> LateEntry {
        let entry = LateEntry::automatic(self.employee, self.date.clone(), self.auto);
        match &self.override_id {
            Some(id) => entry.with_override(LateOverride {
                id: Some(id.clone()),
                employee_id: self.employee,
                date: self.date.clone(),
                mode: OverrideMode::Set,
                amount_iqd: self.override_amount.unwrap_or(self.auto),
                note: String::new(),
            }),
            None => entry,
        }
    }
}

#[derive(Serialize)]
struct LateOutcome<'a> {
    employee_id: i64,
    date: &'a str,
    auto_penalty: Decimal,
    final_penalty: Decimal,
    override_id: Option<&'a str>,
}

impl<'a> From<&'a LateEntry> for LateOutcome<'a> {
    fn from(entry: &'a LateEntry) -> Self {
        LateOutcome {
            employee_id: entry.employee_id,
            date: &entry.date,
            auto_penalty: entry.auto_penalty,
            final_penalty: entry.final_penalty(),
            override_id: entry.current_override().and_then(|o| o.id.as_deref()),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn current_month() -> String {
    chrono::Local::now().format("%Y-%m").to_string()
}

async fn run_adjustments(
    service: &PayrollDataService,
    kind: AdjustmentKind,
    action: AdjustmentAction,
    cancel: &CancelToken,
) -> Result<()> {
    match action {
        AdjustmentAction::List { employee, month } => {
            let list = service
                .fetch_adjustments(kind, employee, month.as_deref(), cancel)
                .await
                .with_context(|| format!("Failed to fetch {}", kind.collection()))?;
            print_json(&list)
        }
        AdjustmentAction::Add { employee, fields } => {
            let created = service
                .create_adjustment(kind, employee, &fields.into(), cancel)
                .await
                .with_context(|| format!("Failed to create {}", kind.collection()))?;
            print_json(&created)
        }
        AdjustmentAction::Update {
            employee,
            id,
            fields,
        } => {
            let updated = service
                .update_adjustment(kind, employee, &id, &fields.into(), cancel)
                .await
                .with_context(|| format!("Failed to update {} {}", kind.collection(), id))?;
            print_json(&updated)
        }
        AdjustmentAction::Delete { employee, id } => {
            service
                .delete_adjustment(kind, employee, &id, cancel)
                .await
                .with_context(|| format!("Failed to delete {} {}", kind.collection(), id))?;
            info!("Deleted {} {}", kind.collection(), id);
            Ok(())
        }
    }
}

async fn run(command: Commands, service: PayrollDataService, cancel: CancelToken) -> Result<()> {
    match command {
        Commands::Payroll {
            employee,
            month,
            csv,
        } => {
            let month = month.unwrap_or_else(current_month);
            let fetch = service
                .fetch_payroll_by_id(employee, &month, &cancel)
                .await
                .with_context(|| format!("Failed to fetch payroll for employee {}", employee))?;
            if let Some(path) = csv {
                export_payroll_csv(&path, &fetch.payroll)
                    .with_context(|| format!("Failed to export CSV to {:?}", path))?;
            }
            print_json(&fetch)
        }
        Commands::Logs {
            employee,
            from,
            to,
            page,
            month,
        } => {
            let logs = match month {
                Some(month) => {
                    let range = payroll_recon_core::MonthRange::parse(&month)?;
                    service.fetch_all_logs(employee, &range, &cancel).await
                }
                None => {
                    let query = LogQuery {
                        employee_id: Some(employee),
                        date_from: from,
                        date_to: to,
                        page,
                        sort: Some("timestamp".to_string()),
                        ..LogQuery::default()
                    };
                    service.fetch_logs(&query, &cancel).await
                }
            }
            .with_context(|| format!("Failed to fetch logs for employee {}", employee))?;
            print_json(&logs)
        }
        Commands::Deductions(args) => {
            run_adjustments(&service, AdjustmentKind::Deduction, args.action, &cancel).await
        }
        Commands::Advances(args) => {
            run_adjustments(&service, AdjustmentKind::Advance, args.action, &cancel).await
        }
        Commands::LateSet {
            day,
            amount,
            reason,
        } => {
            let entry = service
                .save_late_override(&day.entry(), amount, &reason, &cancel)
                .await
                .context("Failed to save late penalty")?;
            print_json(&LateOutcome::from(&entry))
        }
        Commands::LateDelete { day, reason } => {
            let entry = service
                .delete_late_override(&day.entry(), &reason, &cancel)
                .await
                .context("Failed to delete late penalty override")?;
            print_json(&LateOutcome::from(&entry))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;

    let cli = Cli::parse();

    let config = ClientConfig::from_env().context("Failed to load PAYROLL_* configuration")?;
    info!("Using backend at {}", config.base());
    let client = ApiClient::new(config).context("Failed to build API client")?;
    let service = PayrollDataService::from_client(client);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight request");
            on_interrupt.cancel();
        }
    });

    run(cli.command, service, cancel).await
}
