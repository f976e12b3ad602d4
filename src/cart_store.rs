// src/cart_store.rs
//
// Jeden interfejs koszyka nad dwoma magazynami: zdalnym (użytkownik
// zalogowany - źródłem prawdy o sumach jest serwer) i lokalnym (gość -
// sumy liczymy sami i utrwalamy całą wartość pod jednym kluczem).
// Wybór ścieżki zapada przy każdym wywołaniu na podstawie obecności
// poświadczenia sesji.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::discount::DiscountEngine;
use crate::errors::AppError;
use crate::models::{Cart, Discount, NewCartItem, ProductKey, UpdateCartItemPayload};
use crate::state::AppState;
use crate::storage::{self, ANONYMOUS_CART_KEY};

pub struct CartStore {
    state: AppState,
    discounts: DiscountEngine,
    /// Ostatnia znana dobra migawka - to, co renderuje UI. Każda nieudana
    /// mutacja zdalna wraca dokładnie do niej (rollback), nigdy do stanu
    /// częściowo zastosowanego.
    visible: Mutex<Cart>,
    /// Logiczne numery mutacji: odpowiedź serwera należąca do starszej
    /// mutacji na tym samym kluczu tożsamości niż najnowsza wydana jest
    /// odrzucana zamiast nadpisać świeższy stan.
    mutation_seq: AtomicU64,
    issued: Mutex<HashMap<ProductKey, u64>>,
}

impl CartStore {
    pub fn new(state: AppState) -> Self {
        let discounts = DiscountEngine::new(state.api.clone());
        CartStore {
            state,
            discounts,
            visible: Mutex::new(Cart::default()),
            mutation_seq: AtomicU64::new(0),
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.api.is_authenticated()
    }

    /// Bieżąca migawka bez dotykania sieci ani magazynu.
    pub async fn current(&self) -> Cart {
        self.visible.lock().await.clone()
    }

    /// Zalogowany: koszyk z serwera. Gość: wartość utrwalona lokalnie,
    /// domyślnie pusty koszyk - zwracana bez przeliczania.
    pub async fn get(&self) -> Result<Cart, AppError> {
        let cart = if self.is_authenticated() {
            self.state.api.fetch_cart().await?
        } else {
            self.read_local().await?
        };
        *self.visible.lock().await = cart.clone();
        Ok(cart)
    }

    pub async fn add_or_increment(&self, new_item: NewCartItem) -> Result<Cart, AppError> {
        let key = new_item.key;
        if self.is_authenticated() {
            let seq = self.issue_seq(key).await;
            let before = self.current().await;
            {
                // Zmiana widoczna od razu; serwer potwierdzi albo wycofamy.
                let mut visible = self.visible.lock().await;
                visible.add_or_increment(new_item.clone());
                visible.recompute_totals();
            }
            match self.state.api.add_cart_item(&new_item).await {
                Ok(server_cart) => self.adopt_unless_stale(key, seq, server_cart).await,
                Err(e) => self.rollback(before, e).await,
            }
        } else {
            let mut cart = self.read_local().await?;
            cart.add_or_increment(new_item);
            self.commit_local(cart).await
        }
    }

    pub async fn remove(&self, item_id: Uuid) -> Result<Cart, AppError> {
        if self.is_authenticated() {
            let before = self.current().await;
            let key = before
                .items
                .iter()
                .find(|item| item.id == item_id)
                .map(|item| item.key)
                .ok_or(AppError::NotFound)?;
            let seq = self.issue_seq(key).await;
            {
                let mut visible = self.visible.lock().await;
                visible.items.retain(|item| item.id != item_id);
                visible.recompute_totals();
            }
            match self.state.api.remove_cart_item(item_id).await {
                Ok(server_cart) => self.adopt_unless_stale(key, seq, server_cart).await,
                Err(e) => self.rollback(before, e).await,
            }
        } else {
            let mut cart = self.read_local().await?;
            cart.items.retain(|item| item.id != item_id);
            self.commit_local(cart).await
        }
    }

    pub async fn update_quantity(&self, item_id: Uuid, quantity: u32) -> Result<Cart, AppError> {
        if quantity < 1 {
            return Err(AppError::Validation(
                "Ilość pozycji musi wynosić co najmniej 1.".to_string(),
            ));
        }

        if self.is_authenticated() {
            let before = self.current().await;
            let key = before
                .items
                .iter()
                .find(|item| item.id == item_id)
                .map(|item| item.key)
                .ok_or(AppError::NotFound)?;
            let seq = self.issue_seq(key).await;
            {
                let mut visible = self.visible.lock().await;
                if let Some(item) = visible.items.iter_mut().find(|item| item.id == item_id) {
                    item.quantity = quantity;
                }
                visible.recompute_totals();
            }
            let payload = UpdateCartItemPayload {
                quantity: Some(quantity),
                ..UpdateCartItemPayload::default()
            };
            match self.state.api.update_cart_item(item_id, &payload).await {
                Ok(server_cart) => self.adopt_unless_stale(key, seq, server_cart).await,
                Err(e) => self.rollback(before, e).await,
            }
        } else {
            let mut cart = self.read_local().await?;
            let item = cart
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or(AppError::NotFound)?;
            item.quantity = quantity;
            self.commit_local(cart).await
        }
    }

    pub async fn update_size(
        &self,
        item_id: Uuid,
        size_id: i64,
        size_name: String,
    ) -> Result<Cart, AppError> {
        if self.is_authenticated() {
            let before = self.current().await;
            let key = before
                .items
                .iter()
                .find(|item| item.id == item_id)
                .map(|item| item.key)
                .ok_or(AppError::NotFound)?;
            let seq = self.issue_seq(key).await;
            {
                let mut visible = self.visible.lock().await;
                if let Some(item) = visible.items.iter_mut().find(|item| item.id == item_id) {
                    item.key.size_id = size_id;
                    item.size_name = size_name.clone();
                }
                fold_duplicate_lines(&mut visible);
                visible.recompute_totals();
            }
            let payload = UpdateCartItemPayload {
                size_id: Some(size_id),
                size_name: Some(size_name),
                ..UpdateCartItemPayload::default()
            };
            match self.state.api.update_cart_item(item_id, &payload).await {
                Ok(server_cart) => self.adopt_unless_stale(key, seq, server_cart).await,
                Err(e) => self.rollback(before, e).await,
            }
        } else {
            let mut cart = self.read_local().await?;
            let item = cart
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or(AppError::NotFound)?;
            item.key.size_id = size_id;
            item.size_name = size_name;
            fold_duplicate_lines(&mut cart);
            self.commit_local(cart).await
        }
    }

    /// Kody rabatowe są walidowane wyłącznie przez serwer i wyłącznie dla
    /// koszyka uwierzytelnionego; gość dostaje sygnał "wymagane logowanie"
    /// bez żadnej zmiany stanu i bez żądania sieciowego.
    pub async fn apply_discount(&self, code: &str) -> Result<Cart, AppError> {
        if !self.is_authenticated() {
            tracing::info!("Próba użycia kodu rabatowego bez zalogowania - odrzucona lokalnie.");
            return Err(AppError::LoginRequired);
        }
        let cart = self.discounts.validate_and_apply(code).await?;
        *self.visible.lock().await = cart.clone();
        Ok(cart)
    }

    /// Po zalogowaniu: przepisuje lokalny koszyk gościa do koszyka
    /// serwerowego pozycja po pozycji (serwer składa duplikaty po kluczu
    /// tożsamości). Lokalne lustro jest czyszczone dopiero po przyjęciu
    /// wszystkich pozycji; częściowe niepowodzenie zostawia je nietknięte.
    pub async fn merge_local_into_remote(&self) -> Result<Cart, AppError> {
        if !self.is_authenticated() {
            return Err(AppError::LoginRequired);
        }

        let local = self.read_local().await?;
        if local.items.is_empty() {
            return self.get().await;
        }

        tracing::info!(
            "Scalanie lokalnego koszyka ({} pozycji) z koszykiem serwerowym.",
            local.items.len()
        );
        for item in &local.items {
            let new_item = NewCartItem {
                key: item.key,
                name: item.name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                color_name: item.color_name.clone(),
                hex_code: item.hex_code.clone(),
                size_name: item.size_name.clone(),
                image_url: item.image_url.clone(),
            };
            if let Err(e) = self.state.api.add_cart_item(&new_item).await {
                tracing::warn!(
                    "Scalanie koszyka przerwane na pozycji '{}': {}. Lokalne lustro zostaje.",
                    item.name,
                    e
                );
                return Err(e);
            }
        }

        self.state.storage.clear(ANONYMOUS_CART_KEY).await?;
        let merged = self.state.api.fetch_cart().await?;
        *self.visible.lock().await = merged.clone();
        Ok(merged)
    }

    /// Niszczy lokalne lustro koszyka. Wołane wyłącznie z potwierdzonego
    /// przejścia `HandedOff` potoku checkoutu - nigdy z warstwy widoku.
    pub async fn clear_local_mirror(&self) -> Result<(), AppError> {
        self.state.storage.clear(ANONYMOUS_CART_KEY).await?;
        *self.visible.lock().await = Cart::default();
        Ok(())
    }

    // --- ŚCIEŻKA LOKALNA ---

    async fn read_local(&self) -> Result<Cart, AppError> {
        let cart = storage::read_json::<Cart>(self.state.storage.as_ref(), ANONYMOUS_CART_KEY)
            .await?
            .unwrap_or_default();
        Ok(cart)
    }

    /// Utrwala cały koszyk pod jednym kluczem (podmiana wartości) i dopiero
    /// po udanym zapisie podmienia migawkę widoczną.
    async fn commit_local(&self, mut cart: Cart) -> Result<Cart, AppError> {
        // Rabat jest cechą wyłącznie koszyka uwierzytelnionego.
        cart.discount = Discount::default();
        cart.recompute_totals();
        storage::write_json(self.state.storage.as_ref(), ANONYMOUS_CART_KEY, &cart).await?;
        *self.visible.lock().await = cart.clone();
        Ok(cart)
    }

    // --- NUMERACJA MUTACJI I ROLLBACK ---

    async fn issue_seq(&self, key: ProductKey) -> u64 {
        let seq = self.mutation_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.issued.lock().await.insert(key, seq);
        seq
    }

    async fn adopt_unless_stale(
        &self,
        key: ProductKey,
        seq: u64,
        server_cart: Cart,
    ) -> Result<Cart, AppError> {
        let stale = self
            .issued
            .lock()
            .await
            .get(&key)
            .is_some_and(|newest| *newest > seq);
        if stale {
            tracing::debug!(
                "Odpowiedź serwera dla przestarzałej mutacji nr {} (produkt {}) - odrzucona.",
                seq,
                key.product_id
            );
            return Ok(self.current().await);
        }
        *self.visible.lock().await = server_cart.clone();
        Ok(server_cart)
    }

    async fn rollback(&self, before: Cart, error: AppError) -> Result<Cart, AppError> {
        tracing::warn!(
            "Mutacja zdalna koszyka nie powiodła się: {}. Przywracam poprzednią migawkę.",
            error
        );
        *self.visible.lock().await = before;
        Err(error)
    }
}

/// Po zmianie wariantu dwie linie mogą wylądować na tym samym kluczu
/// tożsamości - składamy je w jedną, sumując ilości.
fn fold_duplicate_lines(cart: &mut Cart) {
    let mut seen: HashMap<ProductKey, usize> = HashMap::new();
    let mut index = 0;
    while index < cart.items.len() {
        let key = cart.items[index].key;
        match seen.get(&key) {
            Some(&first) => {
                let quantity = cart.items[index].quantity;
                cart.items[first].quantity += quantity;
                cart.items.remove(index);
            }
            None => {
                seen.insert(key, index);
                index += 1;
            }
        }
    }
}
