#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::storage::KeyValueStore;

/// Credential storage in the platform keychain.
#[derive(Clone)]
pub struct SecretVault {
    service_name: String,
    backend: SecretBackend,
}

#[derive(Clone)]
enum SecretBackend {
    Keyring,
    #[cfg(test)]
    Memory(Arc<Mutex<HashMap<String, SecretString>>>),
}

impl SecretVault {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            backend: SecretBackend::Keyring,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            service_name: "in-memory".to_string(),
            backend: SecretBackend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    pub fn read_secret(&self, account: &str) -> AppResult<Option<SecretString>> {
        match &self.backend {
            SecretBackend::Keyring => {
                let entry = keyring::Entry::new(&self.service_name, account)?;
                match entry.get_password() {
                    Ok(value) => Ok(Some(SecretString::new(value.into()))),
                    Err(keyring::Error::NoEntry) => Ok(None),
                    Err(err) => Err(AppError::from(err)),
                }
            }
            #[cfg(test)]
            SecretBackend::Memory(store) => Ok(store.lock().get(account).cloned()),
        }
    }

    pub fn write_secret(&self, account: &str, secret: &SecretString) -> AppResult<()> {
        match &self.backend {
            SecretBackend::Keyring => {
                let entry = keyring::Entry::new(&self.service_name, account)?;
                entry.set_password(secret.expose_secret())?;
            }
            #[cfg(test)]
            SecretBackend::Memory(store) => {
                store.lock().insert(account.to_string(), secret.clone());
            }
        }
        debug!(
            target: "secret_vault",
            service = %self.service_name,
            account,
            "stored secret"
        );
        Ok(())
    }

    pub fn delete(&self, account: &str) -> AppResult<()> {
        match &self.backend {
            SecretBackend::Keyring => {
                let entry = keyring::Entry::new(&self.service_name, account)?;
                match entry.delete_password() {
                    Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                    Err(err) => Err(AppError::from(err)),
                }
            }
            #[cfg(test)]
            SecretBackend::Memory(store) => {
                store.lock().remove(account);
                Ok(())
            }
        }
    }

    pub fn has(&self, account: &str) -> AppResult<bool> {
        self.read_secret(account).map(|secret| secret.is_some())
    }
}

#[async_trait]
impl KeyValueStore for SecretVault {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .read_secret(key)?
            .map(|secret| secret.expose_secret().to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.write_secret(key, &SecretString::new(value.into()))
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.delete(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_deletes_secrets() {
        let vault = SecretVault::in_memory();
        assert!(!vault.has("anytype_api_key").unwrap());

        vault
            .write_secret("anytype_api_key", &SecretString::new("key".into()))
            .unwrap();
        assert_eq!(
            vault
                .read_secret("anytype_api_key")
                .unwrap()
                .unwrap()
                .expose_secret(),
            "key"
        );

        vault.delete("anytype_api_key").unwrap();
        vault.delete("anytype_api_key").unwrap();
        assert!(!vault.has("anytype_api_key").unwrap());
    }

    #[tokio::test]
    async fn acts_as_key_value_store() {
        let vault = SecretVault::in_memory();
        vault.set("api_key", "legacy").await.unwrap();
        assert_eq!(vault.get("api_key").await.unwrap().as_deref(), Some("legacy"));
        vault.remove("api_key").await.unwrap();
        assert_eq!(vault.get("api_key").await.unwrap(), None);
    }
}
