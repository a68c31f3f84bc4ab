use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Key for the management API (`X-Admin-Key` or bearer).
    pub admin_key: String,
    /// Token store location: `memory:`, `file://<path>`, a bare path, or
    /// `s3://bucket?...`. See `store::open_backend`.
    pub store_url: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_key = std::env::var("KEYGATE_ADMIN_KEY")
        .unwrap_or_else(|_| "CHANGE_ME_ADMIN_KEY".into());

    if admin_key == "CHANGE_ME_ADMIN_KEY" {
        let env_mode = std::env::var("KEYGATE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "KEYGATE_ADMIN_KEY is still the insecure placeholder. \
                 Set a proper key before running in production."
            );
        }
        eprintln!("⚠️  KEYGATE_ADMIN_KEY is not set — using insecure placeholder. Set a real key for production.");
    }

    Ok(Config {
        port: std::env::var("KEYGATE_PORT")
            .unwrap_or_else(|_| "8600".into())
            .parse()
            .unwrap_or(8600),
        admin_key,
        store_url: std::env::var("KEYGATE_STORE_URL")
            .unwrap_or_else(|_| "data/tokens.json".into()),
    })
}
