use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{check_response_error, AppError, AppResult};
use crate::models::{ObjectIcon, ObjectLayout};

const FILE_ICON_WIDTH: &str = "64";
const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinIcon {
    Document,
    PersonCircle,
    Star,
    Tag,
}

/// Icon in a form a renderer can draw without further lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayIcon {
    Emoji { emoji: String },
    Image { source: String },
    Named { source: String, tint: String },
    Builtin { icon: BuiltinIcon },
}

impl DisplayIcon {
    pub fn builtin(icon: BuiltinIcon) -> Self {
        DisplayIcon::Builtin { icon }
    }

    pub fn fallback_for(layout: ObjectLayout) -> Self {
        match layout {
            ObjectLayout::Participant => Self::builtin(BuiltinIcon::PersonCircle),
            _ => Self::builtin(BuiltinIcon::Document),
        }
    }
}

/// Looks up the hex value for an API colour name.
pub fn color_hex(color: &str) -> Option<&'static str> {
    match color {
        "grey" => Some("#b6b6b6"),
        "yellow" => Some("#ecd91b"),
        "orange" => Some("#ffb522"),
        "red" => Some("#f55522"),
        "pink" => Some("#e51ca0"),
        "purple" => Some("#ab50cc"),
        "blue" => Some("#3e58eb"),
        "ice" => Some("#2aa7ee"),
        "teal" => Some("#0fc8ba"),
        "lime" => Some("#5dd400"),
        _ => None,
    }
}

#[derive(Clone)]
pub struct IconResolver {
    http: Client,
    fetch_files: bool,
}

impl IconResolver {
    pub fn new(timeout_secs: u64, fetch_files: bool) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("anytype-extension/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, fetch_files })
    }

    /// Resolver that never touches the network; file icons stay URL
    /// references.
    pub fn offline() -> Self {
        Self {
            http: Client::new(),
            fetch_files: false,
        }
    }

    /// Never fails: malformed or unreachable icons degrade to the layout
    /// fallback.
    pub async fn resolve(&self, icon: Option<&ObjectIcon>, layout: ObjectLayout) -> DisplayIcon {
        match icon {
            Some(ObjectIcon::Emoji { emoji }) if !emoji.is_empty() => DisplayIcon::Emoji {
                emoji: emoji.clone(),
            },
            Some(ObjectIcon::File { file }) if !file.is_empty() => {
                self.resolve_file(file, layout).await
            }
            Some(ObjectIcon::Icon { name, color }) if !name.is_empty() => DisplayIcon::Named {
                source: format!("icons/type/{name}.svg"),
                tint: color_hex(color)
                    .map(str::to_string)
                    .unwrap_or_else(|| color.clone()),
            },
            _ => DisplayIcon::fallback_for(layout),
        }
    }

    async fn resolve_file(&self, file: &str, layout: ObjectLayout) -> DisplayIcon {
        if !self.fetch_files {
            return DisplayIcon::Image {
                source: file.to_string(),
            };
        }
        match self.fetch_data_uri(file).await {
            Ok(source) => DisplayIcon::Image { source },
            Err(err) => {
                warn!(?err, file, "failed to fetch file icon; using fallback");
                DisplayIcon::fallback_for(layout)
            }
        }
    }

    async fn fetch_data_uri(&self, file: &str) -> AppResult<String> {
        let mut url = Url::parse(file)
            .map_err(|err| AppError::Mapping(format!("invalid icon url {file}: {err}")))?;
        url.query_pairs_mut().append_pair("width", FILE_ICON_WIDTH);

        let response = check_response_error(self.http.get(url).send().await?).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        let bytes = response.bytes().await?;
        debug!(file, size = bytes.len(), "fetched file icon");
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
    }
}
