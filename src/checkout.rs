// src/checkout.rs
//
// Potok checkoutu: maszyna stanów nad złożeniem zamówienia i przekazaniem
// do operatora płatności. Warunki wstępne (niepusty koszyk, kompletne dane
// wysyłki) są sprawdzane po stronie klienta, zanim wykonamy jakiekolwiek
// żądanie sieciowe.

use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::Mutex;
use validator::Validate;

use crate::cart_store::CartStore;
use crate::errors::{AppError, validation_messages};
use crate::models::{CreateOrderPayload, OrderItemPayload, OrderSummary, PaymentHandoff, ShippingInfo};
use crate::payment::{self, RedirectGate};
use crate::state::AppState;

/// Stany potoku. `HandedOff` jest terminalny; `Failed` kończy bieżącą
/// próbę i wraca do zbierania danych przez `reset()`.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum CheckoutState {
    CollectingShippingInfo,
    Submitting,
    HandedOff { order_id: String },
    Failed { message: String },
}

pub struct CheckoutPipeline {
    state: AppState,
    cart: Arc<CartStore>,
    redirect_gate: Arc<dyn RedirectGate>,
    checkout_state: Mutex<CheckoutState>,
}

impl CheckoutPipeline {
    pub fn new(state: AppState, cart: Arc<CartStore>, redirect_gate: Arc<dyn RedirectGate>) -> Self {
        CheckoutPipeline {
            state,
            cart,
            redirect_gate,
            checkout_state: Mutex::new(CheckoutState::CollectingShippingInfo),
        }
    }

    pub async fn current_state(&self) -> CheckoutState {
        self.checkout_state.lock().await.clone()
    }

    /// Powrót z `Failed` do zbierania danych wysyłki. W pozostałych
    /// stanach nic nie robi.
    pub async fn reset(&self) {
        let mut checkout_state = self.checkout_state.lock().await;
        if matches!(*checkout_state, CheckoutState::Failed { .. }) {
            *checkout_state = CheckoutState::CollectingShippingInfo;
        }
    }

    /// Składa zamówienie z bieżącej migawki koszyka i wykonuje przekazanie
    /// do operatora płatności.
    ///
    /// Zalogowany użytkownik wysyła same dane wysyłki (koszyk odtwarza
    /// serwer z sesji); gość osadza w payloadzie pełną listę pozycji,
    /// znormalizowaną już do typów liczbowych.
    pub async fn submit(&self, shipping: ShippingInfo) -> Result<PaymentHandoff, AppError> {
        {
            let checkout_state = self.checkout_state.lock().await;
            if *checkout_state != CheckoutState::CollectingShippingInfo {
                return Err(AppError::Validation(format!(
                    "Zamówienia nie można złożyć w stanie '{}'.",
                    checkout_state
                )));
            }
        }

        // Warunki wstępne - bez żadnego żądania sieciowego przy odrzuceniu.
        if let Err(validation_errors) = shipping.validate() {
            tracing::warn!(
                "Błąd walidacji danych checkout: {:?}",
                validation_errors
            );
            return Err(AppError::Validation(validation_messages(&validation_errors)));
        }

        let mut cart_snapshot = self.cart.current().await;
        if cart_snapshot.is_empty() && !self.cart.is_authenticated() {
            // Odświeżenie z magazynu lokalnego nie jest żądaniem sieciowym;
            // dla ścieżki zdalnej decyduje migawka po stronie klienta.
            cart_snapshot = self.cart.get().await?;
        }
        if cart_snapshot.is_empty() {
            tracing::warn!("Próba złożenia zamówienia z pustym koszykiem - odrzucona lokalnie.");
            return Err(AppError::EmptyCart);
        }

        let cart_items = if self.cart.is_authenticated() {
            None
        } else {
            Some(
                cart_snapshot
                    .items
                    .iter()
                    .map(OrderItemPayload::from)
                    .collect::<Vec<OrderItemPayload>>(),
            )
        };
        let payload = CreateOrderPayload {
            shipping,
            cart_items,
        };

        *self.checkout_state.lock().await = CheckoutState::Submitting;
        tracing::info!(
            "Składanie zamówienia: {} pozycji, do zapłaty {} gr.",
            cart_snapshot.items.len(),
            cart_snapshot.total_amount
        );

        let handoff = match self
            .state
            .api
            .create_order(&payload, &self.state.config.payment_form_id)
            .await
        {
            Ok(handoff) => handoff,
            Err(AppError::PaymentFormMissing) => {
                // Błąd protokołu: zamówienie może już istnieć po stronie
                // serwera jako "oczekuje na płatność" - żadnej kompensacji,
                // żadnej nawigacji.
                let message = AppError::PaymentFormMissing.to_string();
                *self.checkout_state.lock().await = CheckoutState::Failed {
                    message: message.clone(),
                };
                return Err(AppError::PaymentFormMissing);
            }
            Err(e) => {
                // Błąd HTTP/semantyczny: komunikat serwera idzie do
                // użytkownika dosłownie, wracamy do zbierania danych.
                *self.checkout_state.lock().await = CheckoutState::CollectingShippingInfo;
                return Err(e);
            }
        };

        let form_html =
            payment::render_redirect_form(&handoff, &self.state.config.payment_form_id)
                .into_string();
        if let Err(e) = self.redirect_gate.navigate(&handoff, &form_html).await {
            tracing::error!("Przekazanie do operatora płatności nie powiodło się: {}", e);
            *self.checkout_state.lock().await = CheckoutState::Failed {
                message: e.to_string(),
            };
            return Err(e);
        }

        *self.checkout_state.lock().await = CheckoutState::HandedOff {
            order_id: handoff.order_id.clone(),
        };

        // Lustro koszyka ginie wyłącznie tutaj, po potwierdzonym
        // przekazaniu - nie przy samym wejściu na ekran potwierdzenia.
        if let Err(e) = self.cart.clear_local_mirror().await {
            tracing::warn!(
                "Nie udało się wyczyścić lokalnego lustra koszyka po przekazaniu: {}",
                e
            );
        }

        Ok(handoff)
    }

    /// Podsumowanie zamówienia dla ekranu potwierdzenia po płatności -
    /// wyłącznie odczyt, zamówienie jest niemutowalne.
    pub async fn fetch_confirmation(&self, order_id: &str) -> Result<OrderSummary, AppError> {
        self.state.api.fetch_order_summary(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{PaymentMethod, ProductKey};
    use crate::payment::TracingRedirectGate;
    use crate::state::AppState;
    use crate::storage::InMemoryStorage;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            shipping_first_name: "Anna".to_string(),
            shipping_last_name: "Kowalska".to_string(),
            shipping_address_line1: "ul. Prosta 1".to_string(),
            shipping_address_line2: None,
            shipping_city: "Warszawa".to_string(),
            shipping_postal_code: "00-001".to_string(),
            shipping_country: "Polska".to_string(),
            shipping_phone: "+48123456789".to_string(),
            payment_method: PaymentMethod::Blik,
        }
    }

    fn pipeline() -> (CheckoutPipeline, Arc<CartStore>) {
        let config = AppConfig::for_base_url("http://localhost:1/api/v1").unwrap();
        let state = AppState::with_storage(config, Arc::new(InMemoryStorage::new()));
        let cart = Arc::new(CartStore::new(state.clone()));
        (
            CheckoutPipeline::new(state, cart.clone(), Arc::new(TracingRedirectGate)),
            cart,
        )
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_any_network_call() {
        let (pipeline, _cart) = pipeline();
        let result = pipeline.submit(shipping()).await;
        assert!(matches!(result, Err(AppError::EmptyCart)));
        assert_eq!(
            pipeline.current_state().await,
            CheckoutState::CollectingShippingInfo
        );
    }

    #[tokio::test]
    async fn blank_shipping_fields_are_rejected_inline() {
        let (pipeline, cart) = pipeline();
        cart.add_or_increment(crate::models::NewCartItem {
            key: ProductKey {
                product_id: 7,
                color_id: 1,
                size_id: 2,
            },
            name: "Sukienka".to_string(),
            unit_price: 1000,
            quantity: 2,
            color_name: "Czarny".to_string(),
            hex_code: "#000000".to_string(),
            size_name: "M".to_string(),
            image_url: "https://cdn.example.com/p.jpg".to_string(),
        })
        .await
        .unwrap();

        let mut blank = shipping();
        blank.shipping_city = "".to_string();
        let result = pipeline.submit(blank).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(
            pipeline.current_state().await,
            CheckoutState::CollectingShippingInfo
        );
    }

    #[tokio::test]
    async fn reset_only_leaves_the_failed_state() {
        let (pipeline, _cart) = pipeline();
        pipeline.reset().await;
        assert_eq!(
            pipeline.current_state().await,
            CheckoutState::CollectingShippingInfo
        );
    }
}
