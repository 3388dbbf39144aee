use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mcp_core::{ConnectionHandle, Manager, McpServersConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Connect to configured MCP servers and exercise them from the command line.
#[derive(Parser)]
#[command(name = "mcp_core", version, about)]
struct Args {
    /// Directory containing `.claw/mcp-servers.json`.
    #[arg(long, env = "MCP_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[arg(long, env = "MCP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to every configured server and list their advertised tools.
    ListTools,
    /// Connect to one server and call a tool on it.
    CallTool {
        server: String,
        tool: String,
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let config = McpServersConfig::load(&args.data_dir)?;
    if config.servers.is_empty() {
        info!(dir = %args.data_dir.display(), "no MCP servers configured");
        return Ok(());
    }

    let manager = Manager::new();
    for server in config.servers.clone() {
        let name = server.name.clone();
        if let Err(e) = manager.connect(server).await {
            error!(server = %name, error = %e, "failed to register connection");
        }
    }

    match args.command {
        Command::ListTools => {
            for server in &config.servers {
                let Some(conn) = manager.get(&server.name) else {
                    continue;
                };
                wait_until_ready(&conn).await;
                match mcp_core::protocol_ops::tools_list(&conn, Duration::from_secs(10)).await {
                    Ok(value) => println!("{}: {value}", server.name),
                    Err(e) => error!(server = %server.name, error = %e, "tools/list failed"),
                }
            }
        }
        Command::CallTool {
            server,
            tool,
            arguments,
        } => {
            let Some(conn) = manager.get(&server) else {
                anyhow::bail!("no such configured server: {server}");
            };
            wait_until_ready(&conn).await;
            let args: serde_json::Value = serde_json::from_str(&arguments)?;
            let result =
                mcp_core::protocol_ops::tools_call(&conn, &tool, args, Duration::from_secs(30)).await?;
            println!("{result}");
        }
    }

    manager.dispose().await;
    Ok(())
}

async fn wait_until_ready(conn: &ConnectionHandle) {
    use mcp_core::record::ConnectionStatus;
    for _ in 0..50 {
        match conn.status() {
            ConnectionStatus::Connected | ConnectionStatus::Degraded => return,
            ConnectionStatus::Closed => return,
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}
