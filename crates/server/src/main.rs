//! Dexkeeper Server
//!
//! Axum server exposing the dex over HTTP, plus one-shot CLI commands that
//! work against the same catalog and collection.

mod api;

use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use dexkeeper_core::config::DexConfig;
use dexkeeper_core::dex::Dex;
use dexkeeper_core::state::io::{get_runtime_path, write_bytes};
use dexkeeper_core::DexError;

use api::mailbox::Mailboxes;

/// Application state
struct AppState {
    dex: Arc<Dex>,
    /// Per-session response mailboxes, keyed by session id
    mailboxes: Arc<Mailboxes>,
    owner_id: Option<Arc<str>>,
}

type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "Dexkeeper - catalog lookup and collection tracker")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show the info view for an entry
    Find {
        /// Name or fragment
        query: String,
    },
    /// Record a catch
    Catch { name: String },
    /// Remove a catch record
    Release { name: String },
    /// List caught entries in catch order
    Caught,
    /// Render one grid page to a PNG file
    Grid {
        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Output file
        #[arg(short, long, default_value = "dexgrid.png")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn run_server(config: &DexConfig, port: u16) -> anyhow::Result<()> {
    let dex = Dex::bootstrap(config).await?;

    let state: SharedState = Arc::new(AppState {
        dex: Arc::new(dex),
        mailboxes: Arc::new(Mailboxes::default()),
        owner_id: config.owner_id.as_deref().map(Arc::from),
    });
    if state.owner_id.is_none() {
        tracing::warn!("No owner configured; every caller may use the dex");
    }

    let app = api::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("🚀 Dexkeeper Server running at http://{}", addr);
    println!("   API v1 Routes:");
    println!("   Lookup:    /api/v1/dex/find");
    println!("   Grid:      /api/v1/dex/view, /sessions/:id, /image, /events");
    println!("   Controls:  /api/v1/dex/controls");
    println!("   Collection: /api/v1/dex/catch, /release, /caught");
    println!("   OpenAPI:   /api/v1/openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_command(config: &DexConfig, command: CliCommand) -> anyhow::Result<()> {
    let dex = Dex::bootstrap(config).await?;

    let result = match command {
        CliCommand::Serve { .. } => return Ok(()),
        CliCommand::Find { query } => dex.find(&query).await.map(|view| {
            let card = view.card();
            println!("{}", card.title);
            for field in &card.fields {
                println!("  {}: {}", field.name, field.value);
            }
            println!("  {}", card.footer);
        }),
        CliCommand::Catch { name } => dex.catch(&name).await.map(|record| {
            println!("✅ Caught {}", record.name);
        }),
        CliCommand::Release { name } => dex.release(&name).await.map(|outcome| {
            if outcome.removed {
                println!("👋 Released {}", outcome.name);
            } else {
                println!("{} was not caught", outcome.name);
            }
        }),
        CliCommand::Caught => dex.caught().await.map(|records| {
            println!("{} caught", records.len());
            for record in records {
                println!(
                    "  {:<16} {}",
                    record.name,
                    record.caught_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }),
        CliCommand::Grid { page, out } => match dex.render_page(page).await {
            Ok(rendered) => {
                write_bytes(&out, &rendered.png).await?;
                println!("🖼  {} -> {}", rendered.caption(), out.display());
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_storage_failure() => Err(e.into()),
        Err(e) => {
            eprintln!("{}", user_text(&e));
            std::process::exit(1);
        }
    }
}

fn user_text(error: &DexError) -> String {
    error.user_message().unwrap_or_else(|| error.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Secrets such as the owner id may live next to the data files
    let env_path = get_runtime_path().join(".env");
    if env_path.exists() {
        dotenvy::from_path(&env_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    init_tracing();

    let config = DexConfig::load().await?;

    match args.command {
        None => run_server(&config, config.port).await,
        Some(CliCommand::Serve { port }) => run_server(&config, port.unwrap_or(config.port)).await,
        Some(command) => run_command(&config, command).await,
    }
}
