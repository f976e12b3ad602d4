// src/api_client.rs
//
// Klient wersjonowanego REST API sklepu (§ kontrakty zamówień/koszyka).
// Przy obecnym poświadczeniu każde żądanie niesie nagłówek Bearer;
// jego brak nie jest tu błędem - o wyborze ścieżki decydują magazyny stanu.

use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{
    Cart, CreateOrderPayload, NewCartItem, NewWishlistItem, OrderSummary, PaymentHandoff,
    ProductStock, UpdateCartItemPayload, Wishlist,
};
use crate::payment;

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    bearer: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Self {
        ApiClient {
            http: Client::new(),
            base_url: config.api_base_url.clone(),
            bearer: Arc::new(RwLock::new(config.bearer_token.clone())),
        }
    }

    /// Obecność poświadczenia sesji - kryterium wyboru ścieżki zdalnej.
    pub fn is_authenticated(&self) -> bool {
        self.bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Podmienia poświadczenie po zalogowaniu/wylogowaniu.
    pub fn set_bearer_token(&self, token: Option<String>) {
        *self.bearer.write().unwrap_or_else(|e| e.into_inner()) =
            token.filter(|t| !t.trim().is_empty());
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Niepoprawna ścieżka API '{}': {}", path, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self
            .bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
        {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Mapuje nieudaną odpowiedź na błąd semantyczny z dosłownym
    /// komunikatem serwera (konwencja treści: `{"error": "..."}`).
    async fn error_from_response(response: Response) -> AppError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Brak treści błędu".to_string());
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);
        tracing::error!("Serwer sklepu odpowiedział błędem: status={}, treść={}", status, message);
        AppError::Api { status, message }
    }

    async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| {
                tracing::error!("Błąd deserializacji odpowiedzi serwera sklepu: {}", e);
                AppError::Internal("Nie można przetworzyć odpowiedzi serwera sklepu".to_string())
            })
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    // --- KOSZYK ---

    pub async fn fetch_cart(&self) -> Result<Cart, AppError> {
        let url = self.endpoint("cart")?;
        let response = self.request(Method::GET, url).send().await?;
        Self::expect_json(response).await
    }

    pub async fn add_cart_item(&self, item: &NewCartItem) -> Result<Cart, AppError> {
        let url = self.endpoint("cart/items")?;
        let response = self.request(Method::POST, url).json(item).send().await?;
        Self::expect_json(response).await
    }

    pub async fn update_cart_item(
        &self,
        item_id: Uuid,
        payload: &UpdateCartItemPayload,
    ) -> Result<Cart, AppError> {
        let url = self.endpoint(&format!("cart/items/{}", item_id))?;
        let response = self.request(Method::PATCH, url).json(payload).send().await?;
        Self::expect_json(response).await
    }

    pub async fn remove_cart_item(&self, item_id: Uuid) -> Result<Cart, AppError> {
        let url = self.endpoint(&format!("cart/items/{}", item_id))?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::expect_json(response).await
    }

    pub async fn apply_discount(&self, code: &str) -> Result<Cart, AppError> {
        let url = self.endpoint("cart/discount")?;
        let response = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    // --- LISTA ŻYCZEŃ ---

    pub async fn fetch_wishlist(&self) -> Result<Wishlist, AppError> {
        let url = self.endpoint("wishlist")?;
        let response = self.request(Method::GET, url).send().await?;
        Self::expect_json(response).await
    }

    pub async fn add_wishlist_item(&self, item: &NewWishlistItem) -> Result<Wishlist, AppError> {
        let url = self.endpoint("wishlist")?;
        let response = self.request(Method::POST, url).json(item).send().await?;
        Self::expect_json(response).await
    }

    pub async fn remove_wishlist_item(&self, item_id: Uuid) -> Result<Wishlist, AppError> {
        let url = self.endpoint(&format!("wishlist/{}", item_id))?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::expect_json(response).await
    }

    /// Zbiorcze sprawdzenie stanów magazynowych - jedno żądanie dla całej
    /// listy identyfikatorów produktów.
    pub async fn fetch_stock_by_product_ids(
        &self,
        product_ids: &[i64],
    ) -> Result<Vec<ProductStock>, AppError> {
        let id_list = product_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<String>>()
            .join(",");
        let url = self.endpoint(&format!(
            "product_stock_by_product_id?product_id={}",
            urlencoding::encode(&id_list)
        ))?;
        let response = self.request(Method::GET, url).send().await?;
        Self::expect_json(response).await
    }

    // --- ZAMÓWIENIA ---

    /// Tworzy zamówienie. Nowy kontrakt zwraca JSON z danymi przekazania;
    /// stary - fragment HTML z auto-wysyłanym formularzem. Obie postaci
    /// kończą jako to samo ustrukturyzowane `PaymentHandoff`.
    pub async fn create_order(
        &self,
        payload: &CreateOrderPayload,
        payment_form_id: &str,
    ) -> Result<PaymentHandoff, AppError> {
        let url = self.endpoint("orders")?;
        let response = self.request(Method::POST, url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/html") {
            tracing::debug!("Endpoint /orders odpowiedział starym formatem HTML");
            let fragment = response.text().await?;
            payment::parse_handoff_fragment(&fragment, payment_form_id)
        } else {
            response.json::<PaymentHandoff>().await.map_err(|e| {
                tracing::error!("Błąd deserializacji danych przekazania płatności: {}", e);
                AppError::Internal(
                    "Nie można przetworzyć odpowiedzi tworzenia zamówienia".to_string(),
                )
            })
        }
    }

    /// Podsumowanie zamówienia do ekranu potwierdzenia po płatności.
    pub async fn fetch_order_summary(&self, order_id: &str) -> Result<OrderSummary, AppError> {
        let url = self.endpoint(&format!(
            "checkout-success?orderId={}",
            urlencoding::encode(order_id)
        ))?;
        let response = self.request(Method::GET, url).send().await?;
        Self::expect_json(response).await
    }
}
