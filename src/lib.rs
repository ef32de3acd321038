pub mod accessories;
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod icons;
pub mod mapping;
pub mod models;
pub mod notify;
pub mod pagination;
pub mod pins;
pub mod secrets;
pub mod storage;
pub mod tools;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::accessories::{process_object, Accessory, ListRow, MutateCallback};
pub use crate::api::AnytypeApi;
pub use crate::auth::AuthGate;
pub use crate::client::AnytypeClient;
pub use crate::config::AppConfig;
pub use crate::errors::{check_response_error, AppError, AppResult};
pub use crate::icons::{DisplayIcon, IconResolver};
pub use crate::models::SortPreference;
pub use crate::notify::{LogNotifier, Notifier, Toast, ToastStyle};
pub use crate::pagination::{PageRequest, Paginated, RequestGeneration};
pub use crate::pins::{PinOutcome, PinStore, PinnedObject};
pub use crate::secrets::SecretVault;
pub use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore};

const VAULT_SERVICE_NAME: &str = "AnytypeExtension";

/// Wired client, auth gate and pin storage for one extension session.
pub struct Extension {
    config: AppConfig,
    api: AnytypeApi,
    auth: AuthGate,
    pins: PinStore,
    searches: RequestGeneration,
}

impl Extension {
    pub async fn initialize(
        config: AppConfig,
        credentials: Arc<dyn KeyValueStore>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        init_tracing();
        let client = AnytypeClient::new(&config)?;
        let icons = IconResolver::new(config.request_timeout_secs, config.fetch_icons)?;
        let api = AnytypeApi::new(client, icons);
        let auth = AuthGate::new(api.clone(), credentials, Arc::clone(&notifier));

        if auth.migrate_auth_key().await {
            info!("moved stored api key to its current location");
        }
        if !api.client().has_api_key() {
            match auth.stored_api_key().await {
                Ok(Some(key)) => api.client().set_api_key(Some(key)),
                Ok(None) => debug!("no stored api key; pairing required"),
                Err(err) => warn!(?err, "failed to read stored api key"),
            }
        }

        info!(
            api_url = %config.api_url,
            api_version = %config.api_version,
            has_api_key = api.client().has_api_key(),
            "extension initialized"
        );

        Ok(Self {
            pins: PinStore::new(storage, notifier),
            config,
            api,
            auth,
            searches: RequestGeneration::new(),
        })
    }

    /// Keychain credentials, a JSON file under the data dir and log toasts.
    pub async fn from_env() -> AppResult<Self> {
        let config = AppConfig::from_env();
        let credentials = Arc::new(SecretVault::new(VAULT_SERVICE_NAME));
        let storage = Arc::new(JsonFileStore::in_dir(&config.data_dir));
        Self::initialize(config, credentials, storage, Arc::new(LogNotifier)).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &AnytypeApi {
        &self.api
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn pins(&self) -> &PinStore {
        &self.pins
    }

    /// First page sized by the configured page limit.
    pub fn first_page(&self) -> PageRequest {
        PageRequest::first(self.config.page_limit)
    }

    /// Runs a named tool with the configured page size as list default.
    pub async fn run_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        tools::run_tool(&self.api, name, input, self.config.page_limit).await
    }

    /// Searches objects and composes list rows for `scope`.
    ///
    /// Returns `Ok(None)` when a newer search started before this one
    /// finished.
    pub async fn search_rows(
        &self,
        scope: &str,
        space_id: Option<&str>,
        query: &str,
        page: PageRequest,
        mutate: Vec<Option<MutateCallback>>,
    ) -> AppResult<Option<Paginated<ListRow>>> {
        let ticket = self.searches.begin();
        let sort = self.config.sort;
        let objects = match space_id {
            Some(space_id) => self.api.search_space(space_id, query, &[], page, sort).await?,
            None => self.api.search_global(query, &[], page, sort).await?,
        };
        let pinned = self.pins.pinned(scope).await;

        let items = objects
            .items
            .into_iter()
            .map(|object| {
                let is_pinned = pinned
                    .iter()
                    .any(|pin| pin.space_id == object.space_id && pin.object_id == object.id);
                process_object(object, is_pinned, mutate.clone(), sort)
            })
            .collect();

        Ok(self.searches.finish(
            ticket,
            Paginated {
                items,
                pagination: objects.pagination,
            },
        ))
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,anytype_extension=debug"));
        // A host may have installed its own subscriber already.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    });
}
