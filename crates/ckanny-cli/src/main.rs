//! ckanny CLI
//!
//! Miscellaneous CKAN utility commands: keep datastore tables in step with
//! their filestore files, and move files in and out of a CKAN filestore.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DsAction, FsAction, HashAction};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Ver => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Ds { ref action } => {
            let context = Context::from_cli(&cli)?;
            cmd_ds(&context, action.clone())
        }
        Commands::Fs { ref action } => {
            let context = Context::from_cli(&cli)?;
            cmd_fs(&context, action.clone())
        }
    }
}

/// Log to stderr at info level; `-q` and `-v` shift it, `RUST_LOG` wins.
fn init_tracing(cli: &Cli) {
    let level = log_level(cli.quiet, cli.verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("Verbose mode enabled");
}

fn log_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

fn cmd_ds(context: &Context, action: DsAction) -> Result<()> {
    let client = context.client()?;
    match action {
        DsAction::Update {
            resource_id,
            load,
            ledger,
            chunksize_bytes,
        } => {
            let options = context.sync_options(&load, chunksize_bytes);
            commands::run_update(&client, &resource_id, &options, context.ledger_config(&ledger))?;
        }
        DsAction::Upload {
            source,
            resource_id,
            load,
        } => {
            let options = context.sync_options(&load, None);
            commands::run_upload(&client, &source, resource_id.as_deref(), &options)?;
        }
        DsAction::Delete {
            resource_id,
            filters,
            force,
        } => {
            commands::run_delete(&client, &resource_id, filters.as_deref(), force)?;
        }
        DsAction::Hash { action } => match action {
            HashAction::Get {
                resource_id,
                ledger,
            } => {
                commands::run_hash_get(&client, &resource_id, context.ledger_config(&ledger))?;
            }
            HashAction::Set {
                resource_id,
                hash,
                ledger,
            } => {
                commands::run_hash_set(
                    &client,
                    &resource_id,
                    &hash,
                    context.ledger_config(&ledger),
                )?;
            }
        },
    }
    Ok(())
}

fn cmd_fs(context: &Context, action: FsAction) -> Result<()> {
    match action {
        FsAction::Fetch {
            resource_id,
            destination,
            name_from_id,
            chunksize_bytes,
        } => {
            let client = context.client()?;
            commands::run_fetch(
                &client,
                &resource_id,
                &destination,
                name_from_id,
                context.chunk_bytes(chunksize_bytes),
            )?;
        }
        FsAction::Upload {
            source,
            resource_id,
            package_id,
            name,
        } => {
            let client = context.client()?;
            commands::filestore::run_upload(
                &client,
                &source,
                resource_id.as_deref(),
                package_id.as_deref(),
                name.as_deref(),
            )?;
        }
        FsAction::Migrate {
            resource_id,
            src_remote,
            dest_remote,
            chunksize_bytes,
        } => {
            let source = match src_remote {
                Some(remote) => context.client_for(&remote)?,
                None => context.client()?,
            };
            let destination = match dest_remote {
                Some(remote) => context.client_for(&remote)?,
                None => context.client()?,
            };
            commands::run_migrate(
                &source,
                &destination,
                &resource_id,
                context.chunk_bytes(chunksize_bytes),
            )?;
        }
    }
    Ok(())
}
