use anyhow::Result;
use chrono::Utc;
use oxdesk_notify::manager::NotificationManager;
use oxdesk_notify::plugin::ChannelRegistry;
use oxdesk_storage::{RecipientRow, TicketStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use oxdesk_server::app;
use oxdesk_server::cache::OpenTicketCache;
use oxdesk_server::channel_seed;
use oxdesk_server::config::{self, SeedFile};
use oxdesk_server::sla::SlaScheduler;
use oxdesk_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  oxdesk-server [config.toml]                              Start the server");
    eprintln!("  oxdesk-server init-channels <config.toml> <seed.json>    Initialize channels from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    oxdesk_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxdesk=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-channels") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-channels requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-channels requires <seed.json> argument")
            })?;
            run_init_channels(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Initialize notification channels and their recipients from a JSON seed file.
async fn run_init_channels(config_path: &str, seed_path: &str) -> Result<()> {
    use oxdesk_storage::{ChannelFilter, ChannelRow};

    let config = config::ServerConfig::load(config_path)?;
    let store = TicketStore::new(&config.database_url).await?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: SeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let mut channels_created = 0u32;
    let mut channels_skipped = 0u32;
    let mut recipients_set = 0u32;

    // List existing channel names for dedup
    let existing = store
        .list_channels(&ChannelFilter::default(), 10000, 0)
        .await?;
    let existing_names: std::collections::HashSet<String> =
        existing.iter().map(|ch| ch.name.clone()).collect();

    for ch in &seed.channels {
        if existing_names.contains(&ch.name) {
            tracing::warn!(name = %ch.name, "Channel already exists, skipping");
            channels_skipped += 1;
            continue;
        }

        let now = Utc::now();
        let row = ChannelRow {
            id: oxdesk_common::id::next_id(),
            name: ch.name.clone(),
            channel_type: ch.channel_type.clone(),
            description: ch.description.clone(),
            min_level: ch.min_level,
            enabled: ch.enabled,
            config: ch.config.clone(),
            created_at: now,
            updated_at: now,
        };

        match store.insert_channel(&row).await {
            Ok(inserted) => {
                tracing::info!(name = %ch.name, id = %inserted.id, "Channel created");
                channels_created += 1;

                for value in &ch.recipients {
                    let recipient = RecipientRow {
                        id: oxdesk_common::id::next_id(),
                        channel_id: inserted.id.clone(),
                        value: value.clone(),
                        manager_only: false,
                        created_at: Utc::now(),
                    };
                    match store.insert_recipient(&recipient).await {
                        Ok(_) => recipients_set += 1,
                        Err(e) => {
                            tracing::warn!(
                                channel = %ch.name,
                                recipient = %value,
                                error = %e,
                                "Failed to set recipient"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(name = %ch.name, error = %e, "Failed to create channel");
            }
        }
    }

    tracing::info!(
        channels_created,
        channels_skipped,
        recipients_set,
        "init-channels completed"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = config::ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.database_url,
        "oxdesk-server starting"
    );

    let store = Arc::new(TicketStore::new(&config.database_url).await?);

    // Seed default notification channels (only when DB has none, all disabled)
    if let Err(e) = channel_seed::init_default_channels(&store).await {
        tracing::error!(error = %e, "Failed to initialize default notification channels");
    }

    let notifier = Arc::new(NotificationManager::new(
        store.clone(),
        ChannelRegistry::default(),
    ));

    let open_tickets = OpenTicketCache::new(store.clone());
    open_tickets.spawn_invalidator();

    let state = AppState {
        store: store.clone(),
        notifier: notifier.clone(),
        open_tickets,
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    // HTTP/REST server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    // SLA escalation scheduler
    let sla_handle = if config.sla.enabled {
        let scheduler = SlaScheduler::new(store.clone(), notifier.clone(), config.sla.tick_secs);
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("SLA escalation scheduler disabled");
        None
    };

    tracing::info!(http = %http_addr, "Server started");

    let result = http_server
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(h) = sla_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
