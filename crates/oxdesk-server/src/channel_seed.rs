use chrono::Utc;
use oxdesk_storage::{ChannelFilter, ChannelRow, TicketStore};

/// Default notification channel definitions for first-time startup.
/// All channels are created with `enabled = false` so the operator must
/// explicitly configure and enable them.
struct ChannelDef {
    name: &'static str,
    channel_type: &'static str,
    description: &'static str,
    min_level: u8,
}

const DEFAULT_CHANNELS: &[ChannelDef] = &[
    ChannelDef {
        name: "Default email notifications",
        channel_type: "email",
        description: "SMTP email channel. Fill in the SMTP config before enabling.",
        min_level: 1,
    },
    ChannelDef {
        name: "Default webhook notifications",
        channel_type: "webhook",
        description: "HTTP webhook channel. Add a webhook URL recipient before enabling.",
        min_level: 1,
    },
];

/// Initialize default notification channels if the database has none yet.
///
/// All channels are created disabled with an empty config so the operator
/// must configure and enable them before they take effect.
pub async fn init_default_channels(store: &TicketStore) -> anyhow::Result<usize> {
    let existing = store
        .list_channels(&ChannelFilter::default(), 1, 0)
        .await?;
    if !existing.is_empty() {
        tracing::debug!("Notification channels already exist, skipping seed initialization");
        return Ok(0);
    }

    let mut created = 0;
    for def in DEFAULT_CHANNELS {
        let now = Utc::now();
        let row = ChannelRow {
            id: oxdesk_common::id::next_id(),
            name: def.name.to_string(),
            channel_type: def.channel_type.to_string(),
            description: Some(def.description.to_string()),
            min_level: def.min_level,
            enabled: false,
            config: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        };
        match store.insert_channel(&row).await {
            Ok(inserted) => {
                tracing::info!(name = %inserted.name, id = %inserted.id, "Seeded notification channel");
                created += 1;
            }
            Err(e) => {
                tracing::error!(name = %def.name, error = %e, "Failed to seed notification channel");
            }
        }
    }
    Ok(created)
}
