use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use client_core::{Connection, HttpDataSource, PushHandler, SessionDataSource};
use shared::{domain::SessionKey, protocol::PushEvent};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    DumpSession { key: String },
    Watch { key: String },
    Reset { key: String },
}

struct PrintingHandler;

#[async_trait]
impl PushHandler for PrintingHandler {
    async fn on_push(&self, event: PushEvent) {
        println!("push: {event:?}");
    }

    async fn on_transport_error(&self, message: String) {
        println!("push channel lost: {message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    match cli.command {
        Command::DumpSession { key } => {
            let source = HttpDataSource::new(&cli.server_url);
            let session = source.fetch_session(&SessionKey(key)).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::Watch { key } => {
            let connection =
                Connection::open(&cli.server_url, &SessionKey(key), Arc::new(PrintingHandler))
                    .await?;
            println!("watching; ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            connection.close().await;
        }
        Command::Reset { key } => {
            let source = HttpDataSource::new(&cli.server_url);
            let key = SessionKey(key);
            source.reset_session(&key).await?;
            println!("session {key} reset");
        }
    }

    Ok(())
}
