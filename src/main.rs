use cinechat::app::{self, Application};
use cinechat::cli::Args;
use cinechat::config::Config;
use cinechat::core::error::CinechatError;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn init_logging(verbose: bool) {
    let default = if verbose { "cinechat=debug" } else { "cinechat=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stderr keeps log lines out of the streamed answer
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(args: Args) -> Result<(), CinechatError> {
    let config = Config::load()?;
    let mut app = Application::new(args, config)?;
    app.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    // A .env in the working directory wins over the inherited environment.
    let dotenv = Config::load_env_file();

    let args = Args::parse();
    init_logging(args.verbose);
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    app::exit_code(run(args).await)
}
