use std::sync::Arc;

use anyhow::Context;
use cns_crypto::EncryptionKey;
use cns_server::{CnsServer, ServerConfig, ServerError};
use cns_service::ObjectService;
use cns_store::ShardedStore;
use cns_wal::FileTransactionLog;
use colored::Colorize;
use serde_json::json;

use crate::cli::*;
use crate::settings::Settings;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Genkey => cmd_genkey(cli.format),
    }
}

fn cmd_genkey(format: OutputFormat) -> anyhow::Result<()> {
    let key = EncryptionKey::generate().to_hex();
    match format {
        OutputFormat::Text => println!("{key}"),
        OutputFormat::Json => println!("{}", json!({ "encryption_key": key })),
    }
    Ok(())
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let settings = Settings::resolve(args)?;
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(serve(settings))
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let port = Arc::new(ShardedStore::new(settings.shards));
    let mut builder = ObjectService::builder(settings.key, port).resilience(settings.resilience);

    match &settings.log_file {
        Some(path) => {
            let log = FileTransactionLog::open(path, settings.wal)
                .with_context(|| format!("opening transaction log {}", path.display()))?;
            builder = builder.log(Arc::new(log));
            println!("{} transaction log {}", "•".cyan(), path.display().to_string().bold());
        }
        None => println!(
            "{} no transaction log configured; data will not survive a restart",
            "!".yellow().bold()
        ),
    }

    let service = Arc::new(builder.build()?);
    let server = CnsServer::new(
        ServerConfig {
            bind_addr: settings.bind_addr,
        },
        service,
    );
    println!(
        "{} cns serving on {} ({} shards)",
        "✓".green().bold(),
        settings.bind_addr.to_string().bold(),
        settings.shards
    );

    match server.serve().await {
        Ok(()) => {
            println!("{} shut down cleanly", "✓".green());
            Ok(())
        }
        Err(err @ ServerError::Teardown(_)) => {
            tracing::error!(error = %err, "durability of earlier writes cannot be confirmed");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
