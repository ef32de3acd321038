use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::AnytypeApi;
use crate::errors::AppResult;
use crate::models::SpaceObject;
use crate::notify::{Notifier, Toast};
use crate::storage::KeyValueStore;

pub const MAX_PINNED: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedObject {
    pub space_id: String,
    pub object_id: String,
}

impl PinnedObject {
    pub fn new(space_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            object_id: object_id.into(),
        }
    }

    fn matches(&self, space_id: &str, object_id: &str) -> bool {
        self.space_id == space_id && self.object_id == object_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Pinned,
    AlreadyPinned,
    LimitReached,
    Failed,
}

pub fn pin_key(scope: &str) -> String {
    format!("pinned_{scope}")
}

/// Ordered, bounded pin lists persisted per view scope.
pub struct PinStore {
    storage: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    write_lock: Mutex<()>,
}

impl PinStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Unreadable or corrupt lists read as empty.
    pub async fn pinned(&self, scope: &str) -> Vec<PinnedObject> {
        match self.load(scope).await {
            Ok(pins) => pins,
            Err(err) => {
                warn!(target: "pins", scope, ?err, "failed to read pinned objects");
                Vec::new()
            }
        }
    }

    pub async fn is_pinned(&self, scope: &str, space_id: &str, object_id: &str) -> bool {
        self.pinned(scope)
            .await
            .iter()
            .any(|pin| pin.matches(space_id, object_id))
    }

    pub async fn pin(&self, scope: &str, space_id: &str, object_id: &str) -> PinOutcome {
        let _guard = self.write_lock.lock().await;
        let mut pins = match self.load(scope).await {
            Ok(pins) => pins,
            Err(err) => {
                warn!(target: "pins", scope, ?err, "failed to read pinned objects; not pinning");
                return PinOutcome::Failed;
            }
        };

        if pins.iter().any(|pin| pin.matches(space_id, object_id)) {
            self.notifier.show(Toast::failure(
                "Failed to pin object",
                "Object is already pinned",
            ));
            return PinOutcome::AlreadyPinned;
        }
        if pins.len() >= MAX_PINNED {
            self.notifier.show(Toast::failure(
                "Failed to pin object",
                format!("Can't pin more than {MAX_PINNED} items"),
            ));
            return PinOutcome::LimitReached;
        }

        pins.push(PinnedObject::new(space_id, object_id));
        match self.save(scope, &pins).await {
            Ok(()) => {
                self.notifier.show(Toast::success("Object pinned"));
                PinOutcome::Pinned
            }
            Err(err) => {
                warn!(target: "pins", scope, ?err, "failed to persist pinned objects");
                PinOutcome::Failed
            }
        }
    }

    pub async fn unpin(&self, scope: &str, space_id: &str, object_id: &str) -> bool {
        self.rewrite(scope, |pins| {
            let before = pins.len();
            pins.retain(|pin| !pin.matches(space_id, object_id));
            pins.len() != before
        })
        .await
    }

    pub async fn move_up(&self, scope: &str, space_id: &str, object_id: &str) -> bool {
        self.rewrite(scope, |pins| {
            match pins.iter().position(|pin| pin.matches(space_id, object_id)) {
                Some(index) if index > 0 => {
                    pins.swap(index, index - 1);
                    true
                }
                _ => false,
            }
        })
        .await
    }

    pub async fn move_down(&self, scope: &str, space_id: &str, object_id: &str) -> bool {
        self.rewrite(scope, |pins| {
            match pins.iter().position(|pin| pin.matches(space_id, object_id)) {
                Some(index) if index + 1 < pins.len() => {
                    pins.swap(index, index + 1);
                    true
                }
                _ => false,
            }
        })
        .await
    }

    /// Fetches pinned objects in pin order. Entries the app reports as
    /// missing or deleted are dropped from the list.
    pub async fn resolve(&self, scope: &str, api: &AnytypeApi) -> AppResult<Vec<SpaceObject>> {
        let pins = self.pinned(scope).await;
        let mut objects = Vec::with_capacity(pins.len());
        for pin in pins {
            match api.get_object(&pin.space_id, &pin.object_id).await {
                Ok(object) => objects.push(object),
                Err(err) if err.is_missing() => {
                    debug!(
                        target: "pins",
                        scope,
                        space_id = %pin.space_id,
                        object_id = %pin.object_id,
                        "dropping pin for missing object"
                    );
                    self.unpin(scope, &pin.space_id, &pin.object_id).await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(objects)
    }

    async fn rewrite<F>(&self, scope: &str, change: F) -> bool
    where
        F: FnOnce(&mut Vec<PinnedObject>) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut pins = match self.load(scope).await {
            Ok(pins) => pins,
            Err(err) => {
                warn!(target: "pins", scope, ?err, "failed to read pinned objects; leaving list unchanged");
                return false;
            }
        };
        if !change(&mut pins) {
            return false;
        }
        match self.save(scope, &pins).await {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "pins", scope, ?err, "failed to persist pinned objects");
                false
            }
        }
    }

    async fn load(&self, scope: &str) -> AppResult<Vec<PinnedObject>> {
        let Some(contents) = self.storage.get(&pin_key(scope)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&contents) {
            Ok(pins) => Ok(pins),
            Err(err) => {
                warn!(target: "pins", scope, error = ?err, "discarding unparseable pinned list");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, scope: &str, pins: &[PinnedObject]) -> AppResult<()> {
        let serialized = serde_json::to_string(pins)?;
        self.storage.set(&pin_key(scope), &serialized).await
    }
}

#[cfg(test)]
mod tests {
    use httptest::matchers::request;
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::AnytypeClient;
    use crate::config::AppConfig;
    use crate::errors::AppError;
    use crate::icons::IconResolver;
    use crate::notify::{RecordingNotifier, ToastStyle};
    use crate::storage::MemoryStore;

    fn store_with(memory: &MemoryStore, notifier: &RecordingNotifier) -> PinStore {
        PinStore::new(Arc::new(memory.clone()), Arc::new(notifier.clone()))
    }

    /// Fails the next read once `fail_next_get` is set.
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_get: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            if self.fail_next_get.swap(false, Ordering::SeqCst) {
                return Err(AppError::Storage("storage unavailable".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> AppResult<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> AppResult<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn failed_reads_never_overwrite_the_stored_list() {
        let memory = MemoryStore::new();
        let flaky = Arc::new(FlakyStore {
            inner: memory.clone(),
            fail_next_get: AtomicBool::new(false),
        });
        let pins = PinStore::new(flaky.clone(), Arc::new(RecordingNotifier::new()));
        for id in ["a", "b", "c"] {
            assert_eq!(pins.pin("objects", "s", id).await, PinOutcome::Pinned);
        }
        let before = memory.snapshot().get("pinned_objects").cloned();

        flaky.fail_next_get.store(true, Ordering::SeqCst);
        assert_eq!(pins.pin("objects", "s", "d").await, PinOutcome::Failed);
        assert_eq!(memory.snapshot().get("pinned_objects").cloned(), before);

        flaky.fail_next_get.store(true, Ordering::SeqCst);
        assert!(!pins.unpin("objects", "s", "a").await);
        flaky.fail_next_get.store(true, Ordering::SeqCst);
        assert!(!pins.move_down("objects", "s", "a").await);
        assert_eq!(memory.snapshot().get("pinned_objects").cloned(), before);

        flaky.fail_next_get.store(true, Ordering::SeqCst);
        assert!(pins.pinned("objects").await.is_empty());
        assert_eq!(pins.pinned("objects").await.len(), 3);
    }

    #[tokio::test]
    async fn pins_are_capped_and_unique() {
        let memory = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        let pins = store_with(&memory, &notifier);

        for index in 0..MAX_PINNED {
            let outcome = pins.pin("objects", "space", &format!("obj{index}")).await;
            assert_eq!(outcome, PinOutcome::Pinned);
        }
        assert_eq!(
            pins.pin("objects", "space", "obj0").await,
            PinOutcome::AlreadyPinned
        );
        assert_eq!(
            pins.pin("objects", "space", "obj9").await,
            PinOutcome::LimitReached
        );
        assert_eq!(pins.pinned("objects").await.len(), MAX_PINNED);

        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), MAX_PINNED + 2);
        assert_eq!(toasts[MAX_PINNED].style, ToastStyle::Failure);
        assert_eq!(
            toasts[MAX_PINNED + 1].message.as_deref(),
            Some("Can't pin more than 5 items")
        );

        // Same object id in another space is a distinct pin.
        assert!(pins.unpin("objects", "space", "obj4").await);
        assert_eq!(
            pins.pin("objects", "other", "obj0").await,
            PinOutcome::Pinned
        );
    }

    #[tokio::test]
    async fn persists_camel_case_pairs_per_scope() {
        let memory = MemoryStore::new();
        let pins = store_with(&memory, &RecordingNotifier::new());
        pins.pin("types", "s1", "o1").await;

        let stored = memory.snapshot();
        assert_eq!(
            stored.get("pinned_types").map(String::as_str),
            Some(r#"[{"spaceId":"s1","objectId":"o1"}]"#)
        );
        assert!(pins.is_pinned("types", "s1", "o1").await);
        assert!(!pins.is_pinned("objects", "s1", "o1").await);
    }

    #[tokio::test]
    async fn reorders_within_bounds() {
        let memory = MemoryStore::new();
        let pins = store_with(&memory, &RecordingNotifier::new());
        for id in ["a", "b", "c"] {
            pins.pin("objects", "s", id).await;
        }

        assert!(!pins.move_up("objects", "s", "a").await);
        assert!(!pins.move_down("objects", "s", "c").await);
        assert!(pins.move_up("objects", "s", "c").await);
        assert!(pins.move_down("objects", "s", "a").await);

        let order: Vec<String> = pins
            .pinned("objects")
            .await
            .into_iter()
            .map(|pin| pin.object_id)
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert!(!pins.unpin("objects", "s", "missing").await);
    }

    #[tokio::test]
    async fn corrupt_lists_read_as_empty() {
        let memory = MemoryStore::with_entries([("pinned_objects", "{not json")]);
        let pins = store_with(&memory, &RecordingNotifier::new());
        assert!(pins.pinned("objects").await.is_empty());
        assert_eq!(pins.pin("objects", "s", "o").await, PinOutcome::Pinned);
    }

    #[tokio::test]
    async fn concurrent_pins_do_not_lose_writes() {
        let memory = MemoryStore::new();
        let pins = store_with(&memory, &RecordingNotifier::new());
        let (a, b, c) = tokio::join!(
            pins.pin("objects", "s", "a"),
            pins.pin("objects", "s", "b"),
            pins.pin("objects", "s", "c"),
        );
        assert_eq!([a, b, c], [PinOutcome::Pinned; 3]);
        assert_eq!(pins.pinned("objects").await.len(), 3);
    }

    #[tokio::test]
    async fn resolve_drops_deleted_objects() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/spaces/s/objects/live"))
                .respond_with(json_encoded(json!({
                    "object": {"id": "live", "name": "Live", "layout": "basic"}
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/spaces/s/objects/gone"))
                .respond_with(status_code(410)),
        );
        let config = AppConfig {
            api_url: server.url_str(""),
            ..AppConfig::default()
        };
        let api = AnytypeApi::new(AnytypeClient::new(&config).unwrap(), IconResolver::offline());

        let memory = MemoryStore::new();
        let pins = store_with(&memory, &RecordingNotifier::new());
        pins.pin("objects", "s", "gone").await;
        pins.pin("objects", "s", "live").await;

        let objects = pins.resolve("objects", &api).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "Live");
        assert_eq!(
            pins.pinned("objects").await,
            vec![PinnedObject::new("s", "live")]
        );
    }
}
