use std::path::PathBuf;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::SortPreference;

/// Version of the local API this build was written against.
pub const API_VERSION: &str = "2025-05-20";

const DEFAULT_API_URL: &str = "http://127.0.0.1:31009";
const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub api_version: String,
    pub sort: SortPreference,
    pub page_limit: u32,
    pub fetch_icons: bool,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub api_url: String,
    pub api_version: String,
    pub sort: SortPreference,
    pub page_limit: u32,
    pub fetch_icons: bool,
    pub request_timeout_secs: u64,
    pub data_dir: String,
    pub has_api_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            api_url: env::var("ANYTYPE_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: env::var("ANYTYPE_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::new(v.into())),
            api_version: env::var("ANYTYPE_API_VERSION")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| API_VERSION.to_string()),
            sort: parse_sort("ANYTYPE_SORT"),
            page_limit: parse_u32("ANYTYPE_PAGE_LIMIT", DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            fetch_icons: parse_bool("ANYTYPE_FETCH_ICONS", true),
            request_timeout_secs: parse_u64(
                "ANYTYPE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )
            .max(1),
            data_dir: env::var("ANYTYPE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            api_url: self.api_url.clone(),
            api_version: self.api_version.clone(),
            sort: self.sort,
            page_limit: self.page_limit,
            fetch_icons: self.fetch_icons,
            request_timeout_secs: self.request_timeout_secs,
            data_dir: self.data_dir.to_string_lossy().to_string(),
            has_api_key: self.api_key.is_some(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            api_version: API_VERSION.to_string(),
            sort: SortPreference::default(),
            page_limit: DEFAULT_PAGE_LIMIT,
            fetch_icons: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| env::temp_dir())
        .join(".anytype-extension")
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_sort(key: &str) -> SortPreference {
    match env::var(key) {
        Ok(value) => SortPreference::from_key(value.trim()).unwrap_or_else(|| {
            warn!(value = %value, "unknown sort preference; using default");
            SortPreference::default()
        }),
        Err(_) => SortPreference::default(),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
