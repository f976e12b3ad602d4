// src/main.rs

use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_core::{AppConfig, AppState, CartStore, WishlistStore};

/// Binarka diagnostyczna: jeden przebieg tylko-do-odczytu po koszyku
/// i liście życzeń skonfigurowanego sklepu.
#[tokio::main]
async fn main() {
    dotenv().ok();

    // Inicjalizacja systemu logowania (tracing)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_core=debug".into()), // Ustaw poziom logowania, np. RUST_LOG=info cargo run
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Inicjalizacja rdzenia sklepu...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Błędna konfiguracja: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "API: {}, tryb: {}",
        config.api_base_url,
        if config.bearer_token.is_some() {
            "zalogowany"
        } else {
            "gość (magazyn lokalny)"
        }
    );

    let state = AppState::new(config);
    let cart_store = CartStore::new(state.clone());
    let wishlist_store = WishlistStore::new(state);

    match cart_store.get().await {
        Ok(cart) => tracing::info!(
            "Koszyk: {} pozycji, suma {} gr, do zapłaty {} gr.",
            cart.items.len(),
            cart.subtotal,
            cart.total_amount
        ),
        Err(e) => tracing::error!("Nie można pobrać koszyka: {}", e),
    }

    match wishlist_store.get().await {
        Ok(wishlist) => {
            tracing::info!("Lista życzeń: {} pozycji.", wishlist.items.len());
            for item in &wishlist.items {
                match item.stock_quantity {
                    Some(stock) => {
                        tracing::info!("  '{}' - stan magazynowy: {}", item.name, stock)
                    }
                    None => tracing::info!("  '{}' - stan magazynowy nieznany", item.name),
                }
            }
        }
        Err(e) => tracing::error!("Nie można pobrać listy życzeń: {}", e),
    }
}
