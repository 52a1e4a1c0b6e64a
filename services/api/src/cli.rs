use crate::demo::{run_demo, run_pay_quote, DemoArgs, PayQuoteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ndis_coord::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "NDIS Service Coordinator",
    about = "Run and demonstrate compliance-aware service assignment and SCHADS pay calculation",
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
    /// Price shifts against the SCHADS rate table
    Pay {
        #[command(subcommand)]
        command: PayCommand,
    },
    /// Walk a service request from intake to invoice with sample workers
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PayCommand {
    /// Quote pay for a single shift without recording anything
    Quote(PayQuoteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// CSV of `classification,base_rate` rows merged into the standard rate table
    #[arg(long)]
    pub(crate) rates_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Pay {
            command: PayCommand::Quote(args),
        } => run_pay_quote(args),
        Command::Demo(args) => run_demo(args),
    }
}
