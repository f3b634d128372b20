use serde::Deserialize;

/// Default request body limit, also the largest accepted import file.
pub const DEFAULT_MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub identity_provider_url: String,
    pub identity_provider_api_key: String,
    pub auth_cache_ttl_secs: u64,
    pub max_import_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            identity_provider_url: std::env::var("IDENTITY_PROVIDER_URL")
                .map_err(|_| anyhow::anyhow!("IDENTITY_PROVIDER_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("IDENTITY_PROVIDER_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("IDENTITY_PROVIDER_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            identity_provider_api_key: std::env::var("IDENTITY_PROVIDER_API_KEY")
                .map_err(|_| {
                    anyhow::anyhow!("IDENTITY_PROVIDER_API_KEY environment variable required")
                })
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("IDENTITY_PROVIDER_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            auth_cache_ttl_secs: std::env::var("AUTH_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("AUTH_CACHE_TTL_SECS must be a whole number"))?,
            max_import_bytes: match std::env::var("MAX_IMPORT_BYTES") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MAX_IMPORT_BYTES must be a whole number"))?,
                Err(_) => DEFAULT_MAX_IMPORT_BYTES,
            },
        };

        // Never log the API key; the database URL only in truncated form.
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            config.database_url.chars().take(20).collect::<String>()
        );
        tracing::debug!("Identity provider URL: {}", config.identity_provider_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
