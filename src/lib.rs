// src/lib.rs

// Deklaracje modułów
pub mod api_client; // dla src/api_client.rs
pub mod cart_store; // dla src/cart_store.rs
pub mod checkout; // dla src/checkout.rs
pub mod config; // dla src/config.rs
pub mod discount; // dla src/discount.rs
pub mod errors; // dla src/errors.rs
pub mod models; // dla src/models.rs
pub mod payment; // dla src/payment.rs
pub mod state; // dla src/state.rs
pub mod storage; // dla src/storage.rs
pub mod wishlist_store; // dla src/wishlist_store.rs

pub use api_client::ApiClient;
pub use cart_store::CartStore;
pub use checkout::{CheckoutPipeline, CheckoutState};
pub use config::AppConfig;
pub use discount::DiscountEngine;
pub use errors::AppError;
pub use payment::{RedirectGate, TracingRedirectGate};
pub use state::AppState;
pub use storage::{InMemoryStorage, JsonFileStorage, StoragePort};
pub use wishlist_store::WishlistStore;
