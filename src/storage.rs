// src/storage.rs

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::AppError;

/// Klucz trwałego koszyka gościa.
pub const ANONYMOUS_CART_KEY: &str = "anonymousCart";
/// Klucz trwałej listy życzeń gościa.
pub const ANONYMOUS_WISHLIST_KEY: &str = "anonymousWishlist";

/// Port trwałego magazynu po stronie klienta: jeden klucz na jedną troskę,
/// każdy zapis podmienia całą wartość (ostatni piszący wygrywa).
///
/// Wstrzykiwany do magazynów stanu, żeby testy mogły podstawić atrapę
/// w pamięci, a przyszła spójność między kartami mogła wejść za tym samym
/// portem.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn write(&self, key: &str, value: String) -> Result<(), AppError>;
    async fn clear(&self, key: &str) -> Result<(), AppError>;
}

/// Odczyt wartości spod klucza wraz z deserializacją.
pub async fn read_json<T: DeserializeOwned>(
    storage: &dyn StoragePort,
    key: &str,
) -> Result<Option<T>, AppError> {
    match storage.read(key).await? {
        Some(raw) => {
            let value = serde_json::from_str::<T>(&raw)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serializacja i podmiana całej wartości pod kluczem.
pub async fn write_json<T: Serialize>(
    storage: &dyn StoragePort,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)?;
    storage.write(key, raw).await
}

// --- BACKEND PLIKOWY ---

/// Magazyn w pojedynczym pliku JSON: obiekt `{ klucz: wartość }`.
/// Dostęp w obrębie procesu jest serializowany mutexem; dwa procesy
/// (dwie karty) nadal nadpisują się nawzajem - ostatni piszący wygrywa.
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        JsonFileStorage {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn load_map(&self) -> Result<HashMap<String, serde_json::Value>, AppError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                if content.trim().is_empty() {
                    return Ok(HashMap::new());
                }
                let map = serde_json::from_str(&content)?;
                Ok(map)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => {
                tracing::error!(
                    "Nie można wczytać pliku magazynu lokalnego {:?}: {}",
                    self.path,
                    e
                );
                Err(AppError::from(e))
            }
        }
    }

    async fn store_map(&self, map: &HashMap<String, serde_json::Value>) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content).await.map_err(|e| {
            tracing::error!(
                "Nie można zapisać pliku magazynu lokalnego {:?}: {}",
                self.path,
                e
            );
            AppError::from(e)
        })
    }
}

#[async_trait]
impl StoragePort for JsonFileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, AppError> {
        let _guard = self.lock.lock().await;
        let map = self.load_map().await?;
        Ok(map.get(key).map(|v| v.to_string()))
    }

    async fn write(&self, key: &str, value: String) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        let parsed: serde_json::Value = serde_json::from_str(&value)?;
        map.insert(key.to_string(), parsed);
        self.store_map(&map).await
    }

    async fn clear(&self, key: &str) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        if map.remove(key).is_some() {
            self.store_map(&map).await?;
        }
        Ok(())
    }
}

// --- BACKEND W PAMIĘCI (testy) ---

#[derive(Default)]
pub struct InMemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl StoragePort for InMemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: String) -> Result<(), AppError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), AppError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cart;

    #[tokio::test]
    async fn in_memory_round_trip_and_clear() {
        let storage = InMemoryStorage::new();
        let mut cart = Cart::default();
        cart.recompute_totals();

        write_json(&storage, ANONYMOUS_CART_KEY, &cart).await.unwrap();
        let read_back: Option<Cart> = read_json(&storage, ANONYMOUS_CART_KEY).await.unwrap();
        assert!(read_back.is_some());

        storage.clear(ANONYMOUS_CART_KEY).await.unwrap();
        let after_clear: Option<Cart> = read_json(&storage, ANONYMOUS_CART_KEY).await.unwrap();
        assert!(after_clear.is_none());
    }

    #[tokio::test]
    async fn file_backend_persists_whole_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let storage = JsonFileStorage::new(path.clone());

        storage
            .write(ANONYMOUS_WISHLIST_KEY, r#"{"items":[]}"#.to_string())
            .await
            .unwrap();
        // Drugi klucz nie może naruszyć pierwszego.
        storage
            .write(ANONYMOUS_CART_KEY, r#"{"items":[],"subtotal":0,"total_amount":0}"#.to_string())
            .await
            .unwrap();

        let wishlist = storage.read(ANONYMOUS_WISHLIST_KEY).await.unwrap();
        assert!(wishlist.is_some());

        storage.clear(ANONYMOUS_WISHLIST_KEY).await.unwrap();
        assert!(storage.read(ANONYMOUS_WISHLIST_KEY).await.unwrap().is_none());
        assert!(storage.read(ANONYMOUS_CART_KEY).await.unwrap().is_some());

        // Brak pliku to pusty magazyn, nie błąd.
        let missing = JsonFileStorage::new(dir.path().join("missing.json"));
        assert!(missing.read(ANONYMOUS_CART_KEY).await.unwrap().is_none());
    }
}
