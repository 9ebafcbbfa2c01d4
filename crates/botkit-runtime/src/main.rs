//! botkit: notification multiplexer binary.

use clap::Parser;

mod cli;
mod daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            daemon::run(opts, args.config_dir.as_deref()).await?;
        }
        cli::Command::Config => {
            print!("{}", daemon::describe_config(args.config_dir.as_deref())?);
        }
    }

    Ok(())
}
