use oxdesk_common::types::Priority;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// CORS allowed origins; empty allows all origins (development mode)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub sla: SlaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaConfig {
    #[serde(default = "default_sla_enabled")]
    pub enabled: bool,
    /// Poll interval of the escalation scheduler, in seconds
    #[serde(default = "default_sla_tick_secs")]
    pub tick_secs: u64,

    /// Response deadline in hours, per ticket priority
    #[serde(default = "default_response_hours")]
    pub response_hours: DeadlineHours,
    /// Resolution deadline in hours, per ticket priority
    #[serde(default = "default_resolution_hours")]
    pub resolution_hours: DeadlineHours,

    /// Category-specific deadline overrides, first matching glob pattern wins
    #[serde(default)]
    pub category_policies: Vec<CategoryPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineHours {
    pub urgent: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl DeadlineHours {
    pub fn for_priority(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Per-category SLA override, e.g. tighter deadlines for `outage*`
/// tickets regardless of priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Glob pattern matched against the ticket category
    pub category_pattern: String,
    pub response_hours: Option<f64>,
    pub resolution_hours: Option<f64>,
}

impl SlaConfig {
    /// Response/resolution deadline hours for a ticket, after applying
    /// category overrides.
    pub fn deadlines_for(&self, priority: Priority, category: Option<&str>) -> (f64, f64) {
        let mut response = self.response_hours.for_priority(priority);
        let mut resolution = self.resolution_hours.for_priority(priority);

        if let Some(category) = category {
            for policy in &self.category_policies {
                if glob_match::glob_match(&policy.category_pattern, category) {
                    if let Some(hours) = policy.response_hours {
                        response = hours;
                    }
                    if let Some(hours) = policy.resolution_hours {
                        resolution = hours;
                    }
                    break;
                }
            }
        }
        (response, resolution)
    }
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            enabled: default_sla_enabled(),
            tick_secs: default_sla_tick_secs(),
            response_hours: default_response_hours(),
            resolution_hours: default_resolution_hours(),
            category_policies: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            database_url: default_database_url(),
            cors_allowed_origins: Vec::new(),
            sla: SlaConfig::default(),
        }
    }
}

// ---- Seed file types (used by `init-channels` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub channels: Vec<SeedChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedChannel {
    pub name: String,
    pub channel_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_seed_min_level")]
    pub min_level: u8,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    pub config: serde_json::Value,
    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://data/oxdesk.db?mode=rwc".to_string()
}

fn default_sla_enabled() -> bool {
    true
}

fn default_sla_tick_secs() -> u64 {
    60
}

fn default_response_hours() -> DeadlineHours {
    DeadlineHours {
        urgent: 1.0,
        high: 4.0,
        medium: 8.0,
        low: 24.0,
    }
}

fn default_resolution_hours() -> DeadlineHours {
    DeadlineHours {
        urgent: 4.0,
        high: 24.0,
        medium: 72.0,
        low: 168.0,
    }
}

fn default_seed_min_level() -> u8 {
    1
}

fn default_seed_enabled() -> bool {
    true
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied_for_empty_config() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert!(config.sla.enabled);
        assert_eq!(config.sla.tick_secs, 60);
        assert_eq!(config.sla.response_hours.urgent, 1.0);
        assert_eq!(config.sla.resolution_hours.low, 168.0);
    }

    #[test]
    fn category_policy_overrides_deadlines() {
        let config: ServerConfig = toml::from_str(
            r#"
            [[sla.category_policies]]
            category_pattern = "outage*"
            response_hours = 0.5
            resolution_hours = 2.0
            "#,
        )
        .unwrap();

        let (response, resolution) = config
            .sla
            .deadlines_for(Priority::Medium, Some("outage-network"));
        assert_eq!(response, 0.5);
        assert_eq!(resolution, 2.0);

        // non-matching category falls back to priority defaults
        let (response, resolution) = config.sla.deadlines_for(Priority::Medium, Some("billing"));
        assert_eq!(response, 8.0);
        assert_eq!(resolution, 72.0);

        // no category at all
        let (response, _) = config.sla.deadlines_for(Priority::Urgent, None);
        assert_eq!(response, 1.0);
    }
}
