mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::folders::CreateArgs;
use commands::run::RunArgs;
use commands::serve::ServeArgs;
use opts::ClientOpts;

#[derive(Parser, Debug)]
#[command(name = "rvlab", version, about = "RV32I build-and-run playground")]
struct Cli {
    #[command(flatten)]
    opts: ClientOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the folder and relay-ticket HTTP API
    Serve(ServeArgs),

    /// Build folders on a running server
    #[command(subcommand)]
    Folders(FoldersCommand),

    /// Run a built folder on the RV32I backend
    Run(RunArgs),
}

#[derive(Subcommand, Debug)]
enum FoldersCommand {
    /// Submit a C program and build it in a new folder
    Create(CreateArgs),

    /// List live folders, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Serve(args) => commands::serve::cmd_serve(&args).await,
        Command::Folders(cmd) => match cmd {
            FoldersCommand::Create(args) => commands::folders::cmd_create(opts, &args).await,
            FoldersCommand::List => commands::folders::cmd_list(opts).await,
        },
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
    }
}
