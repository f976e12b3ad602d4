// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::errors::AppError;

/// Dobrze znany identyfikator formularza płatności w odpowiedzi HTML
/// starego endpointu zamówień.
pub const DEFAULT_PAYMENT_FORM_ID: &str = "payment-provider-form";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1/";
const DEFAULT_LOCAL_STORE_PATH: &str = "storefront_local_store.json";
const DEFAULT_STOCK_CACHE_TTL_SECS: u64 = 60;

/// Konfiguracja rdzenia sklepu, ładowana ze zmiennych środowiskowych.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bazowy adres wersjonowanego API sklepu (z końcowym "/").
    pub api_base_url: Url,
    /// Poświadczenie sesji; jego brak kieruje operacje na ścieżkę lokalną.
    pub bearer_token: Option<String>,
    /// Plik trwałego magazynu lokalnego (koszyk i lista życzeń gościa).
    pub local_store_path: PathBuf,
    /// Identyfikator formularza operatora płatności w odpowiedzi HTML.
    pub payment_form_id: String,
    /// Czas życia wpisu w cache'u stanów magazynowych.
    pub stock_cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let raw_base_url =
            env::var("STOREFRONT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        // Bez końcowego "/" Url::join uciąłby ostatni segment ścieżki.
        let normalized = if raw_base_url.ends_with('/') {
            raw_base_url
        } else {
            format!("{}/", raw_base_url)
        };
        let api_base_url = Url::parse(&normalized).map_err(|e| {
            AppError::Internal(format!(
                "STOREFRONT_API_BASE_URL nie jest poprawnym adresem: {}",
                e
            ))
        })?;

        let bearer_token = env::var("STOREFRONT_BEARER_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let local_store_path = env::var("STOREFRONT_LOCAL_STORE_PATH")
            .unwrap_or_else(|_| DEFAULT_LOCAL_STORE_PATH.into())
            .into();

        let payment_form_id = env::var("STOREFRONT_PAYMENT_FORM_ID")
            .unwrap_or_else(|_| DEFAULT_PAYMENT_FORM_ID.into());

        let stock_cache_ttl = env::var("STOREFRONT_STOCK_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_STOCK_CACHE_TTL_SECS));

        Ok(AppConfig {
            api_base_url,
            bearer_token,
            local_store_path,
            payment_form_id,
            stock_cache_ttl,
        })
    }

    /// Konfiguracja do testów i szybkiego startu bez środowiska.
    pub fn for_base_url(base_url: &str) -> Result<Self, AppError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Ok(AppConfig {
            api_base_url: Url::parse(&normalized)
                .map_err(|e| AppError::Internal(format!("Niepoprawny adres bazowy: {}", e)))?,
            bearer_token: None,
            local_store_path: DEFAULT_LOCAL_STORE_PATH.into(),
            payment_form_id: DEFAULT_PAYMENT_FORM_ID.into(),
            stock_cache_ttl: Duration::from_secs(DEFAULT_STOCK_CACHE_TTL_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let config = AppConfig::for_base_url("http://localhost:8080/api/v1").unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8080/api/v1/");
    }
}
