use crate::demo::{run_carrier_report, run_demo, run_lane_report, DemoArgs, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use freightlens::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Freight KPI Studio",
    about = "Serve and explore carrier/lane KPI analytics from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print KPI rollups over the bundled sample dataset
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Run an end-to-end CLI demo covering the catalog, evaluation, and assistant
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Per-carrier rollups: volume, on-time, tender, and cost blocks
    Carriers(ReportArgs),
    /// Per-lane rollups: volume, on-time, tender, and cost blocks
    Lanes(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report {
            command: ReportCommand::Carriers(args),
        } => run_carrier_report(args),
        Command::Report {
            command: ReportCommand::Lanes(args),
        } => run_lane_report(args),
        Command::Demo(args) => run_demo(args),
    }
}
