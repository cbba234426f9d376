use crate::demo::{run_demo, run_slot_overview, DemoArgs, SlotsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fieldops::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "fieldops",
    about = "Run and demonstrate the technician scheduling service",
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
    /// Walk through booking, incident reassignment and a customer reschedule
    Demo(DemoArgs),
    /// Print slot capacity and demand for a date against the sample roster
    Slots(SlotsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Register the sample technician roster on startup
    #[arg(long)]
    pub(crate) seed: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Slots(args) => run_slot_overview(args),
    }
}
