// src/state.rs

use moka::future::Cache;
use std::sync::Arc;

use crate::api_client::ApiClient;
use crate::config::AppConfig;
use crate::storage::{JsonFileStorage, StoragePort};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub api: ApiClient,
    pub storage: Arc<dyn StoragePort>,
    /// Cache potwierdzonych stanów magazynowych (produkt -> ilość).
    /// Nieudane sprawdzenia nie trafiają do cache'u, żeby "nieznane"
    /// dało się sprawdzić ponownie.
    pub stock_cache: Cache<i64, i64>,
}

impl AppState {
    /// Stan produkcyjny: magazyn lokalny w pliku JSON wskazanym konfiguracją.
    pub fn new(config: AppConfig) -> Self {
        let storage = Arc::new(JsonFileStorage::new(config.local_store_path.clone()));
        Self::with_storage(config, storage)
    }

    /// Stan z wstrzykniętym portem magazynu (testy podstawiają pamięciowy).
    pub fn with_storage(config: AppConfig, storage: Arc<dyn StoragePort>) -> Self {
        let api = ApiClient::new(&config);
        let stock_cache = Cache::builder()
            .time_to_live(config.stock_cache_ttl)
            .max_capacity(10_000)
            .build();
        AppState {
            config,
            api,
            storage,
            stock_cache,
        }
    }
}
