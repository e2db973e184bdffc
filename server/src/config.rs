use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Role;

/// Academic portal realtime server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "portal-server", version, about = "Academic portal presence and notification server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORTAL_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PORTAL_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./portal.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PORTAL_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, JWT key)
    #[arg(long, env = "PORTAL_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Browser origin allowed by CORS (e.g. http://localhost:3000)
    #[arg(long, env = "PORTAL_CORS_ORIGIN")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,

    /// Live-connection behaviour (loaded from [realtime] section in TOML)
    #[arg(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<RealtimeConfig>,
}

/// What happens when an identity binds while another connection holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebindPolicy {
    /// New connection wins; the previous one is closed with code 4005.
    #[default]
    Replace,
    /// New bind is refused while the previous connection is alive.
    Reject,
}

/// Settings for the WebSocket gateway and broadcast fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub rebind_policy: RebindPolicy,

    /// Require ?token=JWT on /ws (default: false)
    #[serde(default)]
    pub require_ws_auth: bool,

    /// Maximum chat message length in characters (default: 4000)
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Recipient class for broadcasts (default: student)
    #[serde(default = "default_broadcast_role")]
    pub broadcast_role: Role,

    /// Link attached to broadcast notifications (default: /student/resources)
    #[serde(default = "default_broadcast_link")]
    pub broadcast_link: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            rebind_policy: RebindPolicy::Replace,
            require_ws_auth: false,
            max_message_length: default_max_message_length(),
            broadcast_role: default_broadcast_role(),
            broadcast_link: default_broadcast_link(),
        }
    }
}

fn default_max_message_length() -> usize {
    4000
}

fn default_broadcast_role() -> Role {
    Role::Student
}

fn default_broadcast_link() -> String {
    "/student/resources".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./portal.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            cors_origin: None,
            realtime: Some(RealtimeConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PORTAL_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PORTAL_").split("__"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Academic Portal Realtime Server Configuration
# Place this file at ./portal.toml or specify with --config <path>
# All settings can be overridden via environment variables (PORTAL_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Browser origin allowed to call the API (unset: CORS disabled)
# cors_origin = "http://localhost:3000"

# ---- Live connections ----
# [realtime]

# Second login for the same identity: "replace" closes the old connection
# (close code 4005), "reject" refuses the new bind with error 409
# rebind_policy = "replace"

# Require ?token=JWT when opening /ws
# require_ws_auth = false

# Maximum chat message length in characters
# max_message_length = 4000

# Who receives broadcast announcements, and where the notification links to
# broadcast_role = "student"
# broadcast_link = "/student/resources"
"#
    .to_string()
}
