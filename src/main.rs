mod balance;
mod cli;
mod dates;
mod error;
mod models;
mod reconciler;
mod settings;
mod store;
mod window;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = match cli.command {
        Commands::Init { force } => cli::init::run(&cli.global, force),
        Commands::Run { stream, kind, format } => cli::run::run(&cli.global, &stream, kind, format),
        Commands::RunAll => cli::run::run_all(&cli.global),
        Commands::Status => cli::status::run(&cli.global),
        Commands::Window { kind } => cli::window::run(&cli.global, kind),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "snapstitch", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "snapstitch=debug" } else { "snapstitch=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
