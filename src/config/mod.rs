use std::env;

/// Runtime configuration for the upload relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Identity-provider service-account credential, raw JSON or
    /// base64-encoded JSON
    pub service_account: Option<String>,

    /// Remote document API bot token
    pub bot_token: Option<String>,

    /// Remote document API destination chat/channel id
    pub chat_id: Option<String>,

    /// Listening port (default: 3000)
    pub port: u16,

    /// Exact allowed CORS origin; None allows any origin
    pub allowed_origin: Option<String>,

    /// Maximum staged file size in bytes (default: 50 MB, the remote
    /// API's own bot-upload limit)
    pub max_file_size: u64,
}

/// The secrets the relay cannot run without, extracted from [`RelayConfig`].
#[derive(Debug, Clone)]
pub struct RelaySecrets {
    pub service_account: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            service_account: None,
            bot_token: None,
            chat_id: None,
            port: 3000,
            allowed_origin: None,
            max_file_size: 50 * 1024 * 1024, // 50 MB
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            service_account: env::var("FIREBASE_SERVICE_ACCOUNT").ok(),

            bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),

            chat_id: env::var("TELEGRAM_CHAT_ID").ok(),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            allowed_origin: env::var("ALLOWED_ORIGIN")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
        }
    }

    /// Extracts the required secrets, failing with the full list of missing
    /// variable names so a broken deployment is diagnosed in one pass.
    pub fn require_secrets(&self) -> anyhow::Result<RelaySecrets> {
        let mut missing = Vec::new();
        if self.service_account.is_none() {
            missing.push("FIREBASE_SERVICE_ACCOUNT");
        }
        if self.bot_token.is_none() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.chat_id.is_none() {
            missing.push("TELEGRAM_CHAT_ID");
        }
        if !missing.is_empty() {
            anyhow::bail!("Missing required configuration: {}", missing.join(", "));
        }

        Ok(RelaySecrets {
            service_account: self.service_account.clone().unwrap_or_default(),
            bot_token: self.bot_token.clone().unwrap_or_default(),
            chat_id: self.chat_id.clone().unwrap_or_default(),
        })
    }
}
