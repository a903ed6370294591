use crate::import::{run_import, run_migrate, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use escala360::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "escala360",
    about = "Run the Escala360 shift scheduling service and its maintenance tasks",
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
    /// Apply pending schema migrations and exit
    Migrate,
    /// Load professionals and shifts from CSV files
    Import(ImportArgs),
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
        Command::Migrate => run_migrate(),
        Command::Import(args) => run_import(args),
    }
}
