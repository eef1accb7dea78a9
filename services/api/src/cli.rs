use crate::commands::{run_dashboard, run_delete_last, run_score, ScoreArgs};
use crate::server;
use altscore::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "AltScore",
    about = "Score credit applicants from alternative financial data and serve the results",
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
    /// Score one applicant from the command line, optionally saving the record
    Score(ScoreArgs),
    /// Print the dashboard summary for the current record store
    Dashboard,
    /// Delete the most recently saved applicant record
    DeleteLast,
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
        Command::Score(args) => run_score(args),
        Command::Dashboard => run_dashboard(),
        Command::DeleteLast => run_delete_last(),
    }
}
