// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use layoutkit::catalog::CatalogLocation;
use layoutkit::config::{Config, Connection, DEFAULT_CATALOG, DEFAULT_DB_PATH};
use layoutkit::db::SqliteStore;
use layoutkit::layouts::LayoutList;
use layoutkit::policy::{DownloadPolicy, DownloadPolicyState};
use layoutkit::queue::MutationKind;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "layoutkit")]
#[command(author, version, about = "Manage installable layouts and their download policy", long_about = None)]
struct Cli {
    /// Database path
    #[arg(short, long, global = true, default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Catalog file path or http(s) URL
    #[arg(short, long, global = true, default_value = DEFAULT_CATALOG)]
    catalog: String,

    /// Whether the active connection is metered (assumed unmetered if omitted)
    #[arg(long, global = true)]
    metered: Option<bool>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the layoutkit database
    Init,
    /// List catalog layouts and their installation state
    List,
    /// Install one or more layouts, applied in the order given
    Install {
        /// Layout ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Uninstall one or more layouts, applied in the order given
    Remove {
        /// Layout ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show or change the metered-connection download policy
    Policy {
        #[command(subcommand)]
        action: Option<PolicyAction>,
    },
    /// Dump stored preferences
    Prefs,
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Show the effective policy for the current connection
    Show,
    /// Store a policy: prompt, allow or deny
    Set { state: String },
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            db_path: self.db_path.clone(),
            catalog: CatalogLocation::parse(&self.catalog),
            metered: self.metered,
        }
    }
}

async fn start_layout_list(config: &Config) -> Result<LayoutList<SqliteStore, Connection>> {
    let store = Arc::new(config.open_store()?);
    let list = LayoutList::start(&config.catalog, store, config.connection_monitor()).await?;
    Ok(list)
}

/// Submit every toggle before awaiting any, then report each outcome
async fn apply_toggles(config: &Config, kind: MutationKind, ids: &[String]) -> Result<()> {
    let list = start_layout_list(config).await?;

    let outcomes: Vec<_> = ids
        .iter()
        .map(|id| {
            let outcome = match kind {
                MutationKind::Install => list.set_layout_as_installed(id),
                MutationKind::Uninstall => list.set_layout_as_uninstalled(id),
            };
            (id, outcome)
        })
        .collect();

    let mut failed = 0;
    for (id, outcome) in outcomes {
        match outcome.await {
            Ok(()) => println!("{} {}: ok", kind, id),
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", kind, id, e);
            }
        }
    }

    list.stop().await;

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} layout change(s) failed",
            failed,
            ids.len()
        ));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Some(Commands::Init) => {
            info!("Initializing layoutkit database at: {}", config.db_path);
            layoutkit::db::init(&config.db_path)?;
            println!("Database initialized successfully at: {}", config.db_path);
            Ok(())
        }
        Some(Commands::List) => {
            let list = start_layout_list(&config).await?;

            println!("Layouts from {}:", config.catalog);
            for entry in list.entries() {
                let status = if entry.preloaded {
                    "preloaded"
                } else if entry.installed {
                    "installed"
                } else {
                    "available"
                };

                match &entry.name {
                    Some(name) => println!("  {} ({}) [{}]", entry.id, name, status),
                    None => println!("  {} [{}]", entry.id, status),
                }
            }

            if !list.needs_user_install() {
                println!("\nAll layouts are preloaded; no installation needed.");
            }

            list.stop().await;
            Ok(())
        }
        Some(Commands::Install { ids }) => apply_toggles(&config, MutationKind::Install, &ids).await,
        Some(Commands::Remove { ids }) => apply_toggles(&config, MutationKind::Uninstall, &ids).await,
        Some(Commands::Policy { action }) => {
            let store = Arc::new(config.open_store()?);
            let policy = DownloadPolicy::new(store, config.connection_monitor());

            match action {
                Some(PolicyAction::Set { state }) => {
                    let state: DownloadPolicyState = state.parse()?;
                    policy.set_state(state).await?;
                    println!("Download policy set to: {}", state);
                }
                Some(PolicyAction::Show) | None => {
                    println!("Download policy: {}", policy.get_current_state().await);
                }
            }

            Ok(())
        }
        Some(Commands::Prefs) => {
            let store = config.open_store()?;
            let preferences = store.entries().await?;

            if preferences.is_empty() {
                println!("No stored preferences.");
            } else {
                for preference in &preferences {
                    println!(
                        "  {} = {} ({})",
                        preference.key, preference.value, preference.updated_at
                    );
                }
            }

            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "layoutkit", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("layoutkit v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'layoutkit --help' for usage information");
            Ok(())
        }
    }
}
