use crate::infra::{parse_period, parse_year, TrackerState};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kpi_tracker::config::AppConfig;
use kpi_tracker::error::AppError;
use kpi_tracker::kpi::{render, write_report, Period, ReportFormat, ReportRange, RoleId};
use kpi_tracker::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "KPI Tracker",
    about = "Track monthly KPI measurements per role and report weighted performance scores",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the interactive console (default command)
    Run(ServeArgs),
    /// Start the HTTP service without the console
    Serve(ServeArgs),
    /// Generate a single report and exit
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory holding the settings file
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[command(subcommand)]
    range: RangeCommand,
    /// Output format: txt, csv, html or json
    #[arg(long, global = true, default_value = "txt")]
    format: ReportFormat,
    /// Write the report into this directory instead of printing it
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    /// Include only these role ids (repeatable)
    #[arg(long = "role", global = true)]
    roles: Vec<u32>,
    /// Override the directory holding the settings file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum RangeCommand {
    /// A single month
    Monthly {
        #[arg(value_parser = parse_year)]
        year: i32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
    /// Three months of a year
    Quarterly {
        #[arg(value_parser = parse_year)]
        year: i32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=4))]
        quarter: u32,
    },
    /// January through December
    Yearly {
        #[arg(value_parser = parse_year)]
        year: i32,
    },
    /// An inclusive range of months, given as YYYY-MM
    Custom {
        #[arg(value_parser = parse_period)]
        start: Period,
        #[arg(value_parser = parse_period)]
        end: Period,
    },
}

impl RangeCommand {
    fn range(&self) -> ReportRange {
        match *self {
            RangeCommand::Monthly { year, month } => ReportRange::Monthly { year, month },
            RangeCommand::Quarterly { year, quarter } => ReportRange::Quarterly { year, quarter },
            RangeCommand::Yearly { year } => ReportRange::Yearly { year },
            RangeCommand::Custom { start, end } => ReportRange::Custom { start, end },
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(ServeArgs::default()));

    match command {
        Command::Run(args) => server::run(args, true).await,
        Command::Serve(args) => server::run(args, false).await,
        Command::Report(args) => run_report(args),
    }
}

fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    telemetry::init(&config.telemetry)?;

    let state = TrackerState::open(&config.storage.data_dir)?;
    let role_ids: Vec<RoleId> = args.roles.into_iter().map(RoleId).collect();
    let selection = (!role_ids.is_empty()).then_some(role_ids.as_slice());
    let report = state.tracker.report(args.range.range(), selection)?;

    match args.output {
        Some(dir) => {
            let path = write_report(&report, args.format, &dir)?;
            println!("Report saved to {}", path.display());
        }
        None => println!("{}", render(&report, args.format)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run_without_a_subcommand() {
        let cli = Cli::try_parse_from(["kpi-tracker"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_report_ranges_and_options() {
        let cli = Cli::try_parse_from([
            "kpi-tracker",
            "report",
            "quarterly",
            "2025",
            "2",
            "--format",
            "html",
            "--role",
            "1",
            "--role",
            "3",
        ])
        .expect("parses");

        let Some(Command::Report(args)) = cli.command else {
            panic!("expected report command");
        };
        assert_eq!(
            args.range.range(),
            ReportRange::Quarterly {
                year: 2025,
                quarter: 2
            }
        );
        assert_eq!(args.format, ReportFormat::Html);
        assert_eq!(args.roles, vec![1, 3]);
    }

    #[test]
    fn rejects_unsupported_years_and_quarters() {
        assert!(Cli::try_parse_from(["kpi-tracker", "report", "yearly", "1999"]).is_err());
        assert!(Cli::try_parse_from(["kpi-tracker", "report", "quarterly", "2025", "5"]).is_err());
        assert!(
            Cli::try_parse_from(["kpi-tracker", "report", "custom", "2025-01", "2025-13"]).is_err()
        );
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "kpi-tracker",
            "serve",
            "--port",
            "9090",
            "--data-dir",
            "/tmp/kpi",
        ])
        .expect("parses");
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.port, Some(9090));
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/kpi")));
    }
}
