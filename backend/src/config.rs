//! Runtime configuration for the portal, read from `PORTAL_*` environment variables.
//!
//! Every value has a default so the server starts with an empty environment.
//! A value that is set but doesn't parse is logged and replaced by its default
//! rather than aborting startup.

use crate::store::StoreOptions;
use log::warn;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Default path suffix every submitted manifest URL must end with.
pub const DEFAULT_MANIFEST_URI: &str = "/funding.json";

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub manifest_uri: String,
    pub max_url_len: usize,
    pub fetch: FetchLimits,
    /// Number of records per moderation page.
    pub page_size: i64,
    /// Upper bound on how long a request waits for the store.
    pub store_wait: Duration,
    /// When set, a successful resubmission of a rejected manifest puts it back to pending.
    pub reopen_rejected: bool,
    /// Token that grants the admin capability. `None` disables the admin routes.
    pub admin_token: Option<String>,
}

/// Resource bounds applied to a single manifest fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_bytes: u64,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_redirects: 3,
            max_bytes: 100 * 1024,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: "portal.sqlite".to_string(),
            manifest_uri: DEFAULT_MANIFEST_URI.to_string(),
            max_url_len: 1024,
            fetch: FetchLimits::default(),
            page_size: 2,
            store_wait: Duration::from_millis(3000),
            reopen_rejected: false,
            admin_token: None,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch = FetchLimits {
            timeout: Duration::from_millis(parse_or(
                &read,
                "PORTAL_FETCH_TIMEOUT_MS",
                defaults.fetch.timeout.as_millis() as u64,
            )),
            max_redirects: parse_or(&read, "PORTAL_MAX_REDIRECTS", defaults.fetch.max_redirects),
            max_bytes: parse_or(&read, "PORTAL_MAX_MANIFEST_BYTES", defaults.fetch.max_bytes),
        };

        let mut page_size = parse_or(&read, "PORTAL_PAGE_SIZE", defaults.page_size);
        if page_size < 1 {
            warn!("PORTAL_PAGE_SIZE must be positive, using {}", defaults.page_size);
            page_size = defaults.page_size;
        }

        Self {
            host: read("PORTAL_HOST").unwrap_or(defaults.host),
            port: parse_or(&read, "PORTAL_PORT", defaults.port),
            db_path: read("PORTAL_DB_PATH").unwrap_or(defaults.db_path),
            manifest_uri: read("PORTAL_MANIFEST_URI").unwrap_or(defaults.manifest_uri),
            max_url_len: parse_or(&read, "PORTAL_MAX_URL_LEN", defaults.max_url_len),
            fetch,
            page_size,
            store_wait: Duration::from_millis(parse_or(
                &read,
                "PORTAL_STORE_WAIT_MS",
                defaults.store_wait.as_millis() as u64,
            )),
            reopen_rejected: parse_or(&read, "PORTAL_REOPEN_REJECTED", defaults.reopen_rejected),
            admin_token: read("PORTAL_ADMIN_TOKEN"),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            wait: self.store_wait,
            reopen_rejected: self.reopen_rejected,
        }
    }
}

fn parse_or<T, F>(read: &F, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring {}={:?} ({}), using {}", key, raw, e, default);
                default
            }
        },
        None => default,
    }
}
