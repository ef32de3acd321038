use std::cmp::Ordering;
use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::AnytypeApi;
use crate::errors::AppResult;
use crate::notify::{Notifier, Toast};
use crate::storage::KeyValueStore;

/// Credential key written by earlier releases.
pub const LEGACY_API_KEY: &str = "api_key";
pub const API_KEY: &str = "anytype_api_key";

pub const APP_UPDATE_TITLE: &str = "App Update Required";
pub const EXTENSION_UPDATE_TITLE: &str = "Extension Update Required";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    Compatible,
    AppOutdated,
    ExtensionOutdated,
}

/// Orders dotted or dashed version strings by their components. Numeric
/// parts compare numerically and a missing part counts as `0`. A textual
/// part marks a pre-release, so it sorts below an absent one
/// (`1.0.0-beta < 1.0.0`) and above any number.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let split = |value: &str| -> Vec<String> {
        value
            .trim()
            .trim_start_matches('v')
            .split(['.', '-'])
            .map(str::to_string)
            .collect()
    };
    let left = split(left);
    let right = split(right);

    for index in 0..left.len().max(right.len()) {
        let ordering = compare_part(
            left.get(index).map(String::as_str),
            right.get(index).map(String::as_str),
        );
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_part(left: Option<&str>, right: Option<&str>) -> Ordering {
    let number = |part: Option<&str>| match part {
        None => Some(0),
        Some(part) => part.parse::<u64>().ok(),
    };
    match (number(left), number(right)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => match left {
            None => Ordering::Greater,
            Some(_) => Ordering::Less,
        },
        (None, Some(_)) => match right {
            None => Ordering::Less,
            Some(_) => Ordering::Greater,
        },
        (None, None) => left.cmp(&right),
    }
}

pub fn version_status(app_version: Option<&str>, expected: &str) -> VersionStatus {
    match app_version {
        None => VersionStatus::AppOutdated,
        Some(app) => match compare_versions(app, expected) {
            Ordering::Less => VersionStatus::AppOutdated,
            Ordering::Greater => VersionStatus::ExtensionOutdated,
            Ordering::Equal => VersionStatus::Compatible,
        },
    }
}

/// Gates API use on version compatibility and owns the credential keys.
pub struct AuthGate {
    api: AnytypeApi,
    credentials: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    migration: OnceCell<bool>,
}

impl AuthGate {
    pub fn new(
        api: AnytypeApi,
        credentials: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            credentials,
            notifier,
            migration: OnceCell::new(),
        }
    }

    /// Returns `false` only when the credential itself looks bad. Version
    /// mismatches and connectivity failures keep the current key.
    pub async fn check_token_validity(&self) -> bool {
        let expected = self.api.client().api_version().to_string();
        match self.api.client().fetch_api_version().await {
            Ok(app_version) => {
                match version_status(app_version.as_deref(), &expected) {
                    VersionStatus::Compatible => {}
                    VersionStatus::AppOutdated => {
                        warn!(app_version = ?app_version, expected = %expected, "app api version is older");
                        self.notifier.show(Toast::failure(
                            APP_UPDATE_TITLE,
                            "Please update the Anytype app to the latest version.",
                        ));
                    }
                    VersionStatus::ExtensionOutdated => {
                        warn!(app_version = ?app_version, expected = %expected, "extension api version is older");
                        self.notifier.show(Toast::failure(
                            EXTENSION_UPDATE_TITLE,
                            "Please update the extension to the latest version.",
                        ));
                    }
                }
                true
            }
            Err(err) if err.is_connection() => {
                debug!(?err, "skipping token check while the app is unreachable");
                true
            }
            Err(err) => {
                warn!(?err, "token check failed");
                false
            }
        }
    }

    /// Moves the legacy credential to its new key. Runs once per gate;
    /// concurrent callers share the first result.
    pub async fn migrate_auth_key(&self) -> bool {
        *self
            .migration
            .get_or_init(|| async {
                match self.run_migration().await {
                    Ok(migrated) => migrated,
                    Err(err) => {
                        warn!(?err, "failed to migrate stored api key");
                        false
                    }
                }
            })
            .await
    }

    /// Forgets the cached migration result.
    pub fn reset_migration(&mut self) {
        self.migration = OnceCell::new();
    }

    async fn run_migration(&self) -> AppResult<bool> {
        let Some(legacy) = self.credentials.get(LEGACY_API_KEY).await? else {
            return Ok(false);
        };

        if self.credentials.get(API_KEY).await?.is_some() {
            self.credentials.remove(LEGACY_API_KEY).await?;
            debug!("removed legacy api key; new key already present");
            return Ok(false);
        }

        self.credentials.set(API_KEY, &legacy).await?;
        self.credentials.remove(LEGACY_API_KEY).await?;
        info!("migrated legacy api key");
        Ok(true)
    }

    pub async fn stored_api_key(&self) -> AppResult<Option<SecretString>> {
        Ok(self
            .credentials
            .get(API_KEY)
            .await?
            .filter(|value| !value.trim().is_empty())
            .map(|value| SecretString::new(value.into())))
    }

    /// Asks the app to display a pairing code.
    pub async fn start_challenge(&self, app_name: &str) -> AppResult<String> {
        let challenge = self.api.create_challenge(app_name).await?;
        self.notifier.show(Toast::animated(
            "Waiting for pairing code",
            "Enter the 4-digit code shown in Anytype",
        ));
        Ok(challenge)
    }

    /// Exchanges the code the user read off the app for an API key, stores
    /// it and starts using it.
    pub async fn solve_challenge(&self, challenge_id: &str, code: &str) -> AppResult<()> {
        let key = self.api.create_api_key(challenge_id, code.trim()).await?;
        self.credentials.set(API_KEY, &key).await?;
        self.api
            .client()
            .set_api_key(Some(SecretString::new(key.into())));
        self.notifier.show(Toast::success("Successfully paired"));
        Ok(())
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.credentials.remove(API_KEY).await?;
        self.api.client().set_api_key(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use httptest::matchers::request;
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;
    use crate::client::{AnytypeClient, VERSION_HEADER};
    use crate::config::AppConfig;
    use crate::errors::AppError;
    use crate::icons::IconResolver;
    use crate::notify::{RecordingNotifier, ToastStyle};
    use crate::storage::MemoryStore;

    const EMPTY_PAGE: &str =
        r#"{"data": [], "pagination": {"total": 0, "offset": 0, "limit": 1, "has_more": false}}"#;

    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
        removes: AtomicUsize,
        fail_writes: bool,
    }

    impl CountingStore {
        fn new(inner: MemoryStore, fail_writes: bool) -> Self {
            Self {
                inner,
                writes: AtomicUsize::new(0),
                removes: AtomicUsize::new(0),
                fail_writes,
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            tokio::task::yield_now().await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> AppResult<()> {
            if self.fail_writes {
                return Err(AppError::Storage("disk full".into()));
            }
            self.writes.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> AppResult<()> {
            self.removes.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.remove(key).await
        }
    }

    fn gate_with(
        api_url: String,
        api_version: &str,
        credentials: Arc<dyn KeyValueStore>,
        notifier: RecordingNotifier,
    ) -> AuthGate {
        let config = AppConfig {
            api_url,
            api_version: api_version.to_string(),
            ..AppConfig::default()
        };
        let api = AnytypeApi::new(AnytypeClient::new(&config).unwrap(), IconResolver::offline());
        AuthGate::new(api, credentials, Arc::new(notifier))
    }

    fn version_server(header: Option<&str>) -> Server {
        let server = Server::run();
        let mut responder = status_code(200);
        if let Some(version) = header {
            responder = responder.append_header(VERSION_HEADER, version.to_string());
        }
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/spaces"))
                .respond_with(responder.body(EMPTY_PAGE)),
        );
        server
    }

    #[test]
    fn compares_numeric_components() {
        assert_eq!(compare_versions("0.9.0", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.10.0", "1.9.3"), Ordering::Greater);
        assert_eq!(compare_versions("2025-05-20", "2025-05-20"), Ordering::Equal);
        assert_eq!(compare_versions("2025-11-08", "2025-05-20"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn pre_release_parts_sort_below_releases() {
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "1.0.0-rc"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0-1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.1-beta", "1.0.0"), Ordering::Greater);
        assert_eq!(
            version_status(Some("1.0.0-beta"), "1.0.0"),
            VersionStatus::AppOutdated
        );
    }

    #[tokio::test]
    async fn older_app_version_notifies_once_and_stays_valid() {
        let server = version_server(Some("0.9.0"));
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(gate.check_token_validity().await);
        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, APP_UPDATE_TITLE);
        assert_eq!(toasts[0].style, ToastStyle::Failure);
    }

    #[tokio::test]
    async fn newer_app_version_asks_for_extension_update() {
        let server = version_server(Some("1.2.0"));
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(gate.check_token_validity().await);
        assert_eq!(notifier.toasts()[0].title, EXTENSION_UPDATE_TITLE);
    }

    #[tokio::test]
    async fn missing_header_counts_as_old_app() {
        let server = version_server(None);
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(gate.check_token_validity().await);
        assert_eq!(notifier.toasts()[0].title, APP_UPDATE_TITLE);
    }

    #[tokio::test]
    async fn matching_version_is_silent() {
        let server = version_server(Some("1.0.0"));
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(gate.check_token_validity().await);
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_key_is_invalid() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/spaces"))
                .respond_with(status_code(401).body("invalid token")),
        );
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(!gate.check_token_validity().await);
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn unreachable_app_is_treated_as_valid() {
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            "http://127.0.0.1:1".into(),
            "1.0.0",
            Arc::new(MemoryStore::new()),
            notifier.clone(),
        );

        assert!(gate.check_token_validity().await);
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn concurrent_migration_runs_once() {
        let memory = MemoryStore::with_entries([(LEGACY_API_KEY, "legacy-key")]);
        let store = Arc::new(CountingStore::new(memory.clone(), false));
        let gate = gate_with(
            "http://127.0.0.1:1".into(),
            "1.0.0",
            store.clone(),
            RecordingNotifier::new(),
        );

        let (first, second) = tokio::join!(gate.migrate_auth_key(), gate.migrate_auth_key());
        assert!(first);
        assert!(second);
        assert_eq!(store.writes.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(store.removes.load(AtomicOrdering::SeqCst), 1);

        let entries = memory.snapshot();
        assert_eq!(entries.get(API_KEY).map(String::as_str), Some("legacy-key"));
        assert!(!entries.contains_key(LEGACY_API_KEY));
    }

    #[tokio::test]
    async fn migration_without_legacy_key_is_a_noop() {
        let store = Arc::new(CountingStore::new(MemoryStore::new(), false));
        let gate = gate_with(
            "http://127.0.0.1:1".into(),
            "1.0.0",
            store.clone(),
            RecordingNotifier::new(),
        );

        assert!(!gate.migrate_auth_key().await);
        assert_eq!(store.writes.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(store.removes.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn migration_cleans_up_when_new_key_exists() {
        let memory = MemoryStore::with_entries([(LEGACY_API_KEY, "old"), (API_KEY, "new")]);
        let store = Arc::new(CountingStore::new(memory.clone(), false));
        let gate = gate_with(
            "http://127.0.0.1:1".into(),
            "1.0.0",
            store.clone(),
            RecordingNotifier::new(),
        );

        assert!(!gate.migrate_auth_key().await);
        assert_eq!(store.writes.load(AtomicOrdering::SeqCst), 0);
        let entries = memory.snapshot();
        assert_eq!(entries.get(API_KEY).map(String::as_str), Some("new"));
        assert!(!entries.contains_key(LEGACY_API_KEY));
    }

    #[tokio::test]
    async fn storage_failures_resolve_to_false_and_reset_reruns() {
        let memory = MemoryStore::with_entries([(LEGACY_API_KEY, "old")]);
        let failing = Arc::new(CountingStore::new(memory.clone(), true));
        let mut gate = gate_with(
            "http://127.0.0.1:1".into(),
            "1.0.0",
            failing,
            RecordingNotifier::new(),
        );

        assert!(!gate.migrate_auth_key().await);
        assert!(!gate.migrate_auth_key().await);

        gate.credentials = Arc::new(memory.clone());
        assert!(!gate.migrate_auth_key().await);
        gate.reset_migration();
        assert!(gate.migrate_auth_key().await);
        assert_eq!(
            memory.snapshot().get(API_KEY).map(String::as_str),
            Some("old")
        );
    }

    #[tokio::test]
    async fn pairing_stores_and_installs_the_key() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/auth/challenges"))
                .respond_with(json_encoded(json!({"challenge_id": "challenge-1"}))),
        );
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/auth/api_keys"))
                .respond_with(json_encoded(json!({"api_key": "fresh-key"}))),
        );
        let memory = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        let gate = gate_with(
            server.url_str(""),
            "1.0.0",
            Arc::new(memory.clone()),
            notifier.clone(),
        );

        let challenge = gate.start_challenge("launcher").await.unwrap();
        assert_eq!(challenge, "challenge-1");
        gate.solve_challenge(&challenge, " 1234 ").await.unwrap();

        assert_eq!(
            memory.snapshot().get(API_KEY).map(String::as_str),
            Some("fresh-key")
        );
        assert!(gate.api.client().has_api_key());
        let styles: Vec<ToastStyle> = notifier.toasts().iter().map(|t| t.style).collect();
        assert_eq!(styles, vec![ToastStyle::Animated, ToastStyle::Success]);
    }
}
