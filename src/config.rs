#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Self {
            log_level,
            database_url,
        }
    }
}
