use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use engine::{
    Engine, Money, Period, ReportFilter, ReportStatus, RevenueCmd, ReviewDecision, SharesLookup,
    SyncCmd,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod gateway;
mod settings;
mod shares;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "revsync")]
#[command(about = "Bank feed sync and monthly revenue distribution")]
struct Cli {
    /// Settings file, without extension (default: `settings`).
    #[arg(long)]
    config: Option<String>,

    /// Overrides `database.url` (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    /// Sync one company, or every account when no company is given.
    Sync {
        #[arg(long)]
        company: Option<String>,
        #[arg(long, requires = "company")]
        account: Option<String>,
        /// First day, inclusive (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, inclusive (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        force: bool,
    },
    /// Sync yesterday for every account.
    DailySync,
    /// Build last month's report for every company.
    Monthly,
    /// Build one monthly report.
    Calculate {
        #[arg(long)]
        company: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Defaults to the `[shares]` settings entry of the company.
        #[arg(long)]
        shares: Option<u64>,
        #[arg(long, allow_hyphen_values = true)]
        operating_costs: Option<Money>,
        #[arg(long, allow_hyphen_values = true)]
        other_expenses: Option<Money>,
        #[arg(long, allow_hyphen_values = true)]
        adjustments: Option<Money>,
    },
    /// Record a review outcome on a report.
    Verify {
        #[arg(long)]
        report: Uuid,
        #[arg(long)]
        admin: String,
        #[arg(long, value_enum)]
        decision: Decision,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show one report, by id or by company and month.
    Report {
        #[arg(long, conflicts_with_all = ["company", "year", "month"])]
        id: Option<Uuid>,
        #[arg(long, requires_all = ["year", "month"])]
        company: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// List the reports of a company.
    Reports {
        #[arg(long)]
        company: String,
        #[arg(long)]
        year: Option<i32>,
        /// PENDING_REVIEW, AUTO_VERIFIED, VERIFIED or REJECTED.
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    /// Recent sync runs of a company.
    History {
        #[arg(long)]
        company: String,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    /// Stored anomalies of a company.
    Anomalies {
        #[arg(long)]
        company: String,
        /// Only `high` and `critical`.
        #[arg(long)]
        high: bool,
    },
    /// Re-validate the transactions of a company.
    Detect {
        #[arg(long)]
        company: String,
    },
    /// Re-run categorization over uncategorized transactions.
    Categorize {
        #[arg(long)]
        company: String,
    },
    /// Year-to-date and trend figures of a company.
    Summary {
        #[arg(long)]
        company: String,
    },
    /// Counters over every report.
    Stats,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Decision {
    Verified,
    Rejected,
}

impl From<Decision> for ReviewDecision {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Verified => ReviewDecision::Verified,
            Decision::Rejected => ReviewDecision::Rejected,
        }
    }
}

fn print<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    Period::day(day).start
}

fn end_of(day: NaiveDate) -> DateTime<Utc> {
    Period::day(day).end_of_day()
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "revsync={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let url = cli.database_url.unwrap_or(settings.database.url);
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    if matches!(cli.command, Command::Migrate) {
        tracing::info!("migrations applied");
        return Ok(());
    }

    let gateway = gateway::HttpGateway::new(&settings.gateway)?;
    let engine = Engine::builder()
        .database(database)
        .gateway(Arc::new(gateway))
        .config(settings.engine)
        .build()
        .await?;
    let shares = shares::ConfiguredShares::new(settings.shares);

    run(&engine, shares, cli.command).await
}

async fn run(
    engine: &Engine,
    shares: shares::ConfiguredShares,
    command: Command,
) -> AppResult<()> {
    match command {
        Command::Migrate => Ok(()),
        Command::Sync {
            company: Some(company),
            account,
            from,
            to,
            force,
        } => {
            let mut cmd = SyncCmd::new(company).force(force);
            cmd.bank_account_id = account;
            cmd.from = from.map(start_of);
            cmd.to = to.map(end_of);
            print(&engine.sync_transactions(cmd).await?)
        }
        Command::Sync {
            company: None,
            from,
            to,
            force,
            ..
        } => print(
            &engine
                .sync_all_accounts(from.map(start_of), to.map(end_of), force)
                .await?,
        ),
        Command::DailySync => print(&engine.run_daily_sync().await?),
        Command::Monthly => print(
            &engine
                .run_monthly_revenue_calculation(Arc::new(shares))
                .await?,
        ),
        Command::Calculate {
            company,
            year,
            month,
            shares: total_shares,
            operating_costs,
            other_expenses,
            adjustments,
        } => {
            let total_shares = match total_shares {
                Some(total) => total,
                None => shares.total_shares(&company).await?,
            };
            let cmd = RevenueCmd::new(company, year, month, total_shares)
                .operating_costs(operating_costs.unwrap_or(Money::ZERO))
                .other_expenses(other_expenses.unwrap_or(Money::ZERO))
                .manual_adjustments(adjustments.unwrap_or(Money::ZERO));
            print(&engine.calculate_monthly_revenue_with(cmd).await?)
        }
        Command::Verify {
            report,
            admin,
            decision,
            notes,
        } => print(
            &engine
                .verify_revenue_report(report, &admin, decision.into(), notes)
                .await?,
        ),
        Command::Report { id: Some(id), .. } => print(&engine.revenue_report(id).await?),
        Command::Report {
            company: Some(company),
            year: Some(year),
            month: Some(month),
            ..
        } => print(&engine.revenue_report_for_month(&company, year, month).await?),
        Command::Report { .. } => Err("pass --id, or --company with --year and --month".into()),
        Command::Reports {
            company,
            year,
            status,
            page,
            limit,
        } => {
            let filter = ReportFilter {
                year,
                status: status
                    .as_deref()
                    .map(ReportStatus::try_from)
                    .transpose()?,
                page,
                limit,
            };
            print(&engine.revenue_reports_for_company(&company, &filter).await?)
        }
        Command::History { company, limit } => {
            print(&engine.sync_history(&company, limit).await?)
        }
        Command::Anomalies { company, high } => {
            let found = if high {
                engine.high_severity_anomalies(&company).await?
            } else {
                engine.anomalies(&company).await?
            };
            print(&found)
        }
        Command::Detect { company } => print(&engine.detect_anomalies(&company).await?),
        Command::Categorize { company } => {
            print(&engine.categorize_uncategorized(&company).await?)
        }
        Command::Summary { company } => print(&engine.revenue_summary(&company).await?),
        Command::Stats => print(&engine.report_statistics().await?),
    }
}
