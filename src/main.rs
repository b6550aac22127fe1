// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use tvgrid::Config;
use tvgrid::api::ContentClient;
use tvgrid::state::StateOptions;
use tvgrid::view::MatchMode;

mod cli;
use cli::{CacheCommand, CategoriesCommand, ListCommand, OutputFormat};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "tvgrid")]
#[command(about = "A terminal channel browser and player for M3U-backed IPTV catalogs")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (tvgrid_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    /// Content server base URL (or set TVGRID_SERVER env var)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive TUI (default if no command given)
    Tui,

    /// Run the content backend serving /api/channels and /api/categories
    Serve {
        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Playlist URL or file path
        #[arg(long)]
        playlist: Option<String>,
        /// Directory with static front-end files
        #[arg(long)]
        static_dir: Option<PathBuf>,
        /// Seconds a fetched playlist stays fresh
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Print the channel view for a category or search query
    List {
        /// Category to show
        #[arg(short, long)]
        category: Option<String>,
        /// Search query (takes precedence over the category)
        #[arg(short, long)]
        search: Option<String>,
        /// Match the category against whole tags instead of substrings
        #[arg(long)]
        exact_tags: bool,
        /// Output format (text, json, m3u)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the category list
    Categories {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the offline asset cache
    #[command(subcommand)]
    Cache(CacheSubCommand),

    /// Print the effective configuration
    Config {
        /// Write it to the config file instead, filling in defaults
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum CacheSubCommand {
    /// Precache the front-end assets and drop stale caches
    Install,
    /// List cached asset URLs
    List,
    /// Clear the cache
    Clear,
    /// Fetch a path through the cache and write it to stdout
    Fetch { path: String },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("tvgrid_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("tvgrid=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if matches!(cli.command, Some(Commands::Serve { .. })) {
        // The server has no screen to protect, so it logs requests by default
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(EnvFilter::new("tvgrid=info"))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path);
    tracing::debug!("Using config file {}", config_path.display());

    if let Some(server) = &cli.server {
        config.server.url = server.clone();
    }

    match cli.command {
        Some(Commands::Tui) | None => {
            tvgrid::run_tui(config).await?;
        }

        Some(Commands::Serve {
            bind,
            port,
            playlist,
            static_dir,
            ttl,
        }) => {
            let mut serve = config.serve.clone();
            if let Some(bind) = bind {
                serve.bind_address = bind;
            }
            if let Some(port) = port {
                serve.port = port;
            }
            if let Some(playlist) = playlist {
                serve.playlist = playlist;
            }
            if let Some(ttl) = ttl {
                serve.ttl_secs = ttl;
            }
            if static_dir.is_some() {
                serve.static_dir = static_dir;
            }
            eprintln!(
                "Serving {} on http://{}:{}",
                serve.playlist, serve.bind_address, serve.port
            );
            tvgrid::server::serve(&serve).await?;
        }

        Some(Commands::List {
            category,
            search,
            exact_tags,
            format,
        }) => {
            let client = ContentClient::new(&config.server.url)?;
            let mut options = StateOptions::from(&config.ui).view;
            if exact_tags {
                options.match_mode = MatchMode::ExactTag;
            }
            let cmd = ListCommand {
                category,
                search,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(&client, &options).await?;
        }

        Some(Commands::Categories { format }) => {
            let client = ContentClient::new(&config.server.url)?;
            let cmd = CategoriesCommand {
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(&client).await?;
        }

        Some(Commands::Cache(cache_cmd)) => {
            let cmd = match cache_cmd {
                CacheSubCommand::Install => CacheCommand::Install,
                CacheSubCommand::List => CacheCommand::List,
                CacheSubCommand::Clear => CacheCommand::Clear,
                CacheSubCommand::Fetch { path } => CacheCommand::Fetch { path },
            };
            cmd.execute(&config.cache, &config.server.url).await?;
        }

        Some(Commands::Config { write }) => {
            if write {
                config.save(&config_path)?;
                println!("Wrote {}", config_path.display());
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
