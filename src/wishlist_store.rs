// src/wishlist_store.rs
//
// Lista życzeń w tym samym dwutorowym kształcie co koszyk, plus boczny
// kanał wzbogacania o stany magazynowe: po każdym odczycie i każdej
// mutacji jedno zbiorcze zapytanie o wszystkie produkty z listy.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cart_store::CartStore;
use crate::errors::AppError;
use crate::models::{NewCartItem, NewWishlistItem, Wishlist, WishlistItem};
use crate::state::AppState;
use crate::storage::{self, ANONYMOUS_WISHLIST_KEY};

pub struct WishlistStore {
    state: AppState,
    visible: Mutex<Wishlist>,
}

impl WishlistStore {
    pub fn new(state: AppState) -> Self {
        WishlistStore {
            state,
            visible: Mutex::new(Wishlist::default()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.api.is_authenticated()
    }

    pub async fn get(&self) -> Result<Wishlist, AppError> {
        let mut wishlist = if self.is_authenticated() {
            self.state.api.fetch_wishlist().await?
        } else {
            self.read_local().await?
        };
        self.enrich_stock(&mut wishlist.items).await;
        *self.visible.lock().await = wishlist.clone();
        Ok(wishlist)
    }

    pub async fn add(&self, new_item: NewWishlistItem) -> Result<Wishlist, AppError> {
        let mut wishlist = if self.is_authenticated() {
            self.state.api.add_wishlist_item(&new_item).await?
        } else {
            let mut wishlist = self.read_local().await?;
            // Lista życzeń nie ma ilości: ponowne dodanie tego samego
            // klucza tożsamości jest pochłaniane, nie dublowane.
            if !wishlist.items.iter().any(|item| item.key == new_item.key) {
                wishlist.items.push(WishlistItem {
                    id: Uuid::new_v4(),
                    key: new_item.key,
                    name: new_item.name,
                    price: new_item.price,
                    color_name: new_item.color_name,
                    hex_code: new_item.hex_code,
                    size_name: new_item.size_name,
                    image_url: new_item.image_url,
                    stock_quantity: None,
                });
            }
            self.write_local(&wishlist).await?;
            wishlist
        };
        self.enrich_stock(&mut wishlist.items).await;
        *self.visible.lock().await = wishlist.clone();
        Ok(wishlist)
    }

    pub async fn remove(&self, item_id: Uuid) -> Result<Wishlist, AppError> {
        let mut wishlist = if self.is_authenticated() {
            self.state.api.remove_wishlist_item(item_id).await?
        } else {
            let mut wishlist = self.read_local().await?;
            wishlist.items.retain(|item| item.id != item_id);
            self.write_local(&wishlist).await?;
            wishlist
        };
        self.enrich_stock(&mut wishlist.items).await;
        *self.visible.lock().await = wishlist.clone();
        Ok(wishlist)
    }

    /// Przeniesienie pozycji do koszyka to dwa sekwencyjne kroki: dodanie
    /// do koszyka, potem usunięcie z listy. Gdy drugi krok zawiedzie,
    /// pozycja istnieje w obu miejscach - zgłaszamy to dedykowanym błędem
    /// i niczego nie naprawiamy automatycznie.
    pub async fn move_to_cart(
        &self,
        item_id: Uuid,
        cart: &CartStore,
    ) -> Result<Wishlist, AppError> {
        let item = {
            let visible = self.visible.lock().await;
            visible
                .items
                .iter()
                .find(|item| item.id == item_id)
                .cloned()
        };
        let item = match item {
            Some(item) => item,
            None => {
                let wishlist = self.get().await?;
                wishlist
                    .items
                    .iter()
                    .find(|candidate| candidate.id == item_id)
                    .cloned()
                    .ok_or(AppError::NotFound)?
            }
        };

        cart.add_or_increment(NewCartItem {
            key: item.key,
            name: item.name.clone(),
            unit_price: item.price,
            quantity: 1,
            color_name: item.color_name.clone(),
            hex_code: item.hex_code.clone(),
            size_name: item.size_name.clone(),
            image_url: item.image_url.clone(),
        })
        .await?;

        match self.remove(item_id).await {
            Ok(wishlist) => Ok(wishlist),
            Err(e) => {
                tracing::warn!(
                    "Pozycja '{}' została w koszyku i na liście życzeń: {}",
                    item.name,
                    e
                );
                Err(AppError::WishlistMoveIncomplete {
                    reason: e.to_string(),
                })
            }
        }
    }

    // --- WZBOGACANIE O STANY MAGAZYNOWE ---

    /// Jedno zbiorcze zapytanie dla wszystkich produktów listy; produkty
    /// nieobecne w odpowiedzi (i całe nieudane sprawdzenie) dają `None` -
    /// "nieznane" nigdy nie udaje "zerowego stanu". Potwierdzone wartości
    /// przechodzą przez krótki cache.
    async fn enrich_stock(&self, items: &mut [WishlistItem]) {
        if items.is_empty() {
            return;
        }

        let mut known: HashMap<i64, i64> = HashMap::new();
        let mut missing: HashSet<i64> = HashSet::new();
        for item in items.iter() {
            let product_id = item.key.product_id;
            if known.contains_key(&product_id) || missing.contains(&product_id) {
                continue;
            }
            match self.state.stock_cache.get(&product_id).await {
                Some(cached) => {
                    tracing::debug!("Cache HIT stanu magazynowego dla produktu {}", product_id);
                    known.insert(product_id, cached);
                }
                None => {
                    missing.insert(product_id);
                }
            }
        }

        if !missing.is_empty() {
            let mut ids: Vec<i64> = missing.into_iter().collect();
            ids.sort_unstable();
            match self.state.api.fetch_stock_by_product_ids(&ids).await {
                Ok(rows) => {
                    for row in rows {
                        self.state
                            .stock_cache
                            .insert(row.product_id, row.stock_quantity)
                            .await;
                        known.insert(row.product_id, row.stock_quantity);
                    }
                }
                Err(e) => {
                    // Boczny kanał: niepowodzenie nie unieważnia operacji
                    // na liście, zostawia tylko stany nieznane.
                    tracing::warn!("Zbiorcze sprawdzenie stanów magazynowych nie powiodło się: {}", e);
                }
            }
        }

        for item in items.iter_mut() {
            item.stock_quantity = known.get(&item.key.product_id).copied();
        }
    }

    // --- ŚCIEŻKA LOKALNA ---

    async fn read_local(&self) -> Result<Wishlist, AppError> {
        // Wartość lokalna to tablica pozycji; pusta lista gdy brak zapisu.
        let items = storage::read_json::<Vec<WishlistItem>>(
            self.state.storage.as_ref(),
            ANONYMOUS_WISHLIST_KEY,
        )
        .await?
        .unwrap_or_default();
        Ok(Wishlist { items })
    }

    async fn write_local(&self, wishlist: &Wishlist) -> Result<(), AppError> {
        storage::write_json(
            self.state.storage.as_ref(),
            ANONYMOUS_WISHLIST_KEY,
            &wishlist.items,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::ProductKey;
    use crate::storage::InMemoryStorage;
    use std::sync::Arc;

    fn anonymous_store() -> WishlistStore {
        let config = AppConfig::for_base_url("http://localhost:1/api/v1").unwrap();
        let state = AppState::with_storage(config, Arc::new(InMemoryStorage::new()));
        WishlistStore::new(state)
    }

    fn wish(product_id: i64) -> NewWishlistItem {
        NewWishlistItem {
            key: ProductKey {
                product_id,
                color_id: 1,
                size_id: 2,
            },
            name: format!("Produkt {}", product_id),
            price: 1500,
            color_name: "Beżowy".to_string(),
            hex_code: "#f5f5dc".to_string(),
            size_name: "S".to_string(),
            image_url: "https://cdn.example.com/w.jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_key_is_absorbed_not_duplicated() {
        let store = anonymous_store();
        store.add(wish(7)).await.unwrap();
        let wishlist = store.add(wish(7)).await.unwrap();
        assert_eq!(wishlist.items.len(), 1);
    }

    #[tokio::test]
    async fn failed_stock_lookup_yields_none_not_zero() {
        // Adres bez nasłuchującego serwera: zbiorcze sprawdzenie pada,
        // operacja na liście mimo to się udaje.
        let store = anonymous_store();
        let wishlist = store.add(wish(7)).await.unwrap();
        assert_eq!(wishlist.items.len(), 1);
        assert_eq!(wishlist.items[0].stock_quantity, None);
    }

    #[tokio::test]
    async fn remove_persists_the_filtered_list() {
        let store = anonymous_store();
        store.add(wish(7)).await.unwrap();
        let wishlist = store.add(wish(8)).await.unwrap();
        let first_id = wishlist
            .items
            .iter()
            .find(|i| i.key.product_id == 7)
            .map(|i| i.id)
            .unwrap();

        let wishlist = store.remove(first_id).await.unwrap();
        assert_eq!(wishlist.items.len(), 1);
        assert_eq!(wishlist.items[0].key.product_id, 8);

        let reread = store.get().await.unwrap();
        assert_eq!(reread.items.len(), 1);
    }
}
