// tests/wishlist_remote.rs
//
// Zdalna ścieżka listy życzeń: zbiorcze wzbogacanie o stany magazynowe
// (rozróżnienie "nieznany" od "zerowy") i dwukrokowe przenoszenie do
// koszyka ze zgłaszaną, nienaprawianą duplikacją.

use httpmock::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use storefront_core::models::{Cart, ProductKey, Wishlist, WishlistItem};
use storefront_core::{AppConfig, AppError, AppState, CartStore, InMemoryStorage, WishlistStore};

fn wishlist_item(id: Uuid, product_id: i64) -> WishlistItem {
    WishlistItem {
        id,
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
        stock_quantity: None,
    }
}

fn authenticated_state(server: &MockServer) -> AppState {
    let mut config = AppConfig::for_base_url(&server.url("/api/v1")).unwrap();
    config.bearer_token = Some("token-testowy".to_string());
    AppState::with_storage(config, InMemoryStorage::shared())
}

#[tokio::test]
async fn enrichment_distinguishes_unknown_from_out_of_stock() {
    let server = MockServer::start_async().await;
    let wishlist = Wishlist {
        items: vec![
            wishlist_item(Uuid::new_v4(), 7),
            wishlist_item(Uuid::new_v4(), 8),
            wishlist_item(Uuid::new_v4(), 9),
        ],
    };

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/wishlist");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::to_value(&wishlist).unwrap());
        })
        .await;
    // Jedno zbiorcze zapytanie o wszystkie trzy produkty; produkt 9
    // nie występuje w odpowiedzi.
    let stock_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/product_stock_by_product_id")
                .query_param("product_id", "7,8,9");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!([
                    { "product_id": 7, "stock_quantity": 5 },
                    { "product_id": 8, "stock_quantity": 0 }
                ]));
        })
        .await;

    let store = WishlistStore::new(authenticated_state(&server));
    let fetched = store.get().await.unwrap();

    stock_mock.assert_async().await;
    let stock_of = |product_id: i64| {
        fetched
            .items
            .iter()
            .find(|item| item.key.product_id == product_id)
            .and_then(|item| item.stock_quantity)
    };
    assert_eq!(stock_of(7), Some(5));
    // Potwierdzone zero to co innego niż nieudane sprawdzenie.
    assert_eq!(stock_of(8), Some(0));
    assert_eq!(stock_of(9), None);
}

#[tokio::test]
async fn failed_batch_lookup_leaves_all_stocks_unknown() {
    let server = MockServer::start_async().await;
    let wishlist = Wishlist {
        items: vec![wishlist_item(Uuid::new_v4(), 7)],
    };

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/wishlist");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::to_value(&wishlist).unwrap());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/product_stock_by_product_id");
            then.status(500)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "error": "Magazyn niedostępny." }));
        })
        .await;

    let store = WishlistStore::new(authenticated_state(&server));
    let fetched = store.get().await.unwrap();
    assert_eq!(fetched.items[0].stock_quantity, None);
}

#[tokio::test]
async fn move_to_cart_removes_from_wishlist_after_adding() {
    let server = MockServer::start_async().await;
    let line_id = Uuid::new_v4();
    let wishlist = Wishlist {
        items: vec![wishlist_item(line_id, 7)],
    };
    let mut cart_after_add = Cart::default();
    cart_after_add.add_or_increment(storefront_core::models::NewCartItem {
        key: ProductKey {
            product_id: 7,
            color_id: 1,
            size_id: 2,
        },
        name: "Produkt 7".to_string(),
        unit_price: 1500,
        quantity: 1,
        color_name: "Beżowy".to_string(),
        hex_code: "#f5f5dc".to_string(),
        size_name: "S".to_string(),
        image_url: "https://cdn.example.com/w.jpg".to_string(),
    });
    cart_after_add.recompute_totals();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/wishlist");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::to_value(&wishlist).unwrap());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/product_stock_by_product_id");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!([{ "product_id": 7, "stock_quantity": 3 }]));
        })
        .await;
    let add_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/cart/items")
                .json_body_partial(r#"{"product_id": 7, "quantity": 1}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::to_value(&cart_after_add).unwrap());
        })
        .await;
    let delete_mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(format!("/api/v1/wishlist/{}", line_id));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "items": [] }));
        })
        .await;

    let state = authenticated_state(&server);
    let cart_store = CartStore::new(state.clone());
    let wishlist_store = WishlistStore::new(state);
    wishlist_store.get().await.unwrap();

    let after = wishlist_store
        .move_to_cart(line_id, &cart_store)
        .await
        .unwrap();

    add_mock.assert_async().await;
    delete_mock.assert_async().await;
    assert!(after.items.is_empty());
    assert_eq!(cart_store.current().await.subtotal, 1500);
}

#[tokio::test]
async fn failed_second_step_reports_duplication_instead_of_fixing_it() {
    let server = MockServer::start_async().await;
    let line_id = Uuid::new_v4();
    let wishlist = Wishlist {
        items: vec![wishlist_item(line_id, 7)],
    };

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/wishlist");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::to_value(&wishlist).unwrap());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/product_stock_by_product_id");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!([{ "product_id": 7, "stock_quantity": 3 }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/cart/items");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "items": [], "subtotal": 0,
                    "discount": { "amount": 0, "message": null },
                    "total_amount": 0
                }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path(format!("/api/v1/wishlist/{}", line_id));
            then.status(500)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "error": "Chwilowy błąd serwera." }));
        })
        .await;

    let state = authenticated_state(&server);
    let cart_store = CartStore::new(state.clone());
    let wishlist_store = WishlistStore::new(state);
    wishlist_store.get().await.unwrap();

    let result = wishlist_store.move_to_cart(line_id, &cart_store).await;
    assert!(matches!(
        result,
        Err(AppError::WishlistMoveIncomplete { .. })
    ));
}
