mod cli;
mod commands;
mod terminal;

use anyhow::Result;
use clap::Parser;

use loghaul_core::config::{load_dotenv, Config};
use loghaul_ingest::logging::init_tracing;

use crate::cli::{CliArgs, Command};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();
    init_tracing("warn", args.json);

    let terminal = Terminal::new();

    let mut config = Config::from_env();
    if let Some(path) = args.catalog {
        config.catalog.path = path;
    }
    if let Some(dir) = args.base_dir {
        config.storage.base_dir = dir;
    }

    let result = match args.command {
        Command::Run(run) => {
            config.log_summary();
            commands::run(config, run, &terminal).await
        }
        Command::Add(add) => commands::add(config, add, &terminal).await,
        Command::List(list) => commands::list(&config, &list, &terminal),
        Command::Show { label } => commands::show(&config, &label),
        Command::TestNotify { to, label } => {
            commands::test_notify(&config, to, label, &terminal).await
        }
    };

    if let Err(e) = &result {
        terminal.print_error(&format!("{:#}", e))?;
        std::process::exit(1);
    }
    Ok(())
}
