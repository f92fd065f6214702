mod cli;
mod commands;
mod config;
mod logging;
mod store;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use commands::Context;
use config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.remote_dir {
        config.remote_dir = dir;
    }
    if let Some(format) = cli.output {
        config.output_format = grist::FileType::from(format).to_string();
    }
    if cli.only_spec {
        config.only_spec = true;
    }

    log::debug!("Remote store at {}", config.remote_dir.display());
    let registry = store::registry(&config.remote_dir)?;
    let ctx = Context { config, registry };

    match cli.command {
        Command::Get { uid } => commands::get(&ctx, &uid),
        Command::List {
            path,
            remote,
            source,
        } => commands::list(&ctx, &path, remote, &source),
        Command::Show { path, source } => commands::show(&ctx, &path, &source),
        Command::Diff { path, source } => commands::diff(&ctx, &path, &source),
        Command::Apply { path, source } => commands::apply(&ctx, &path, &source),
        Command::Pull { dir, targets } => commands::pull(&ctx, &dir, &targets),
        Command::Export { path, dir, source } => commands::export(&ctx, &path, &dir, &source),
        Command::Watch { dir, path, source } => commands::watch(&ctx, &dir, &path, &source),
    }
}
