use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_EMAIL_FROM: &str = "Uptime Monitor <alerts@uptime.local>";
pub const DEFAULT_SCHEDULER_TICK_MS: u64 = 5000;
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_CHECK_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: String,
    pub queue_prefix: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,
    pub scheduler_tick_ms: u64,
    pub scheduler_stats_interval_secs: u64,
    pub scheduler_static_urls: Vec<String>,
    pub worker_concurrency: usize,
    pub notifier_concurrency: usize,
    pub check_default_timeout_ms: u64,
    pub alert_default_email: Option<String>,
    pub alert_default_webhook: Option<String>,
    /// Move `alerts:dead` back onto `alerts` when the notifier starts.
    pub notifier_replay_dead_letters: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            queue_prefix: String::new(),
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: String::new(),
            smtp_password: String::new(),
            email_from: DEFAULT_EMAIL_FROM.to_string(),
            scheduler_tick_ms: DEFAULT_SCHEDULER_TICK_MS,
            scheduler_stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS,
            scheduler_static_urls: Vec::new(),
            worker_concurrency: DEFAULT_CONCURRENCY,
            notifier_concurrency: DEFAULT_CONCURRENCY,
            check_default_timeout_ms: DEFAULT_CHECK_TIMEOUT_MS,
            alert_default_email: None,
            alert_default_webhook: None,
            notifier_replay_dead_letters: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            redis_url: redis_url_from_env(),
            queue_prefix: env::var("QUEUE_PREFIX").unwrap_or_default(),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: parse_or("SMTP_PORT", DEFAULT_SMTP_PORT),
            smtp_username: env::var("EMAIL_USER").unwrap_or_default(),
            smtp_password: env::var("EMAIL_PASS").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_EMAIL_FROM.to_string()),
            scheduler_tick_ms: parse_or("SCHEDULER_TICK_MS", DEFAULT_SCHEDULER_TICK_MS),
            scheduler_stats_interval_secs: parse_or(
                "SCHEDULER_STATS_INTERVAL_SECS",
                DEFAULT_STATS_INTERVAL_SECS,
            ),
            scheduler_static_urls: env::var("SCHEDULER_STATIC_URLS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            worker_concurrency: parse_or("WORKER_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
            notifier_concurrency: parse_or("NOTIFIER_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
            check_default_timeout_ms: parse_or("CHECK_DEFAULT_TIMEOUT_MS", DEFAULT_CHECK_TIMEOUT_MS),
            alert_default_email: non_empty_var("ALERT_DEFAULT_EMAIL"),
            alert_default_webhook: non_empty_var("ALERT_DEFAULT_WEBHOOK"),
            notifier_replay_dead_letters: parse_or("NOTIFIER_REPLAY_DEAD_LETTERS", false),
        };

        if !config.is_database_configured() {
            warn!("Persistence store not configured - SUPABASE_URL or SUPABASE_SERVICE_KEY missing");
        }

        config
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_smtp_configured(&self) -> bool {
        !self.smtp_host.is_empty()
            && !self.smtp_username.is_empty()
            && !self.smtp_password.is_empty()
    }
}

fn redis_url_from_env() -> String {
    if let Ok(url) = env::var("REDIS_URL") {
        return url;
    }

    match env::var("REDIS_HOST") {
        Ok(host) => {
            let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
            format!("redis://{}:{}", host, port)
        }
        Err(_) => {
            warn!("REDIS_URL not set, using default {}", DEFAULT_REDIS_URL);
            DEFAULT_REDIS_URL.to_string()
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blank_entries() {
        let urls = split_list(" https://a.example , ,https://b.example,");
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler_tick_ms, 5000);
        assert_eq!(config.worker_concurrency, 10);
        assert_eq!(config.notifier_concurrency, 10);
        assert_eq!(config.check_default_timeout_ms, 5000);
        assert!(!config.is_database_configured());
        assert!(!config.is_smtp_configured());
    }
}
