// src/discount.rs

use crate::api_client::ApiClient;
use crate::errors::AppError;
use crate::models::Cart;

/// Silnik rabatowy jest celowo pozbawiony logiki po stronie klienta:
/// żadnych tabel kodów, żadnego cache'owania. Kod jest walidowany wyłącznie
/// przez serwer, a wynik (zaktualizowany koszyk albo odrzucenie z dosłownym
/// komunikatem) wraca bez interpretacji - rabatu nie da się sfałszować
/// lokalnie.
pub struct DiscountEngine {
    api: ApiClient,
}

impl DiscountEngine {
    pub fn new(api: ApiClient) -> Self {
        DiscountEngine { api }
    }

    pub async fn validate_and_apply(&self, code: &str) -> Result<Cart, AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation(
                "Kod rabatowy nie może być pusty.".to_string(),
            ));
        }

        tracing::debug!("Wysyłanie kodu rabatowego do walidacji serwerowej.");
        let cart = self.api.apply_discount(code).await?;
        tracing::info!(
            "Kod rabatowy przyjęty, rabat: {} gr.",
            cart.discount.amount
        );
        Ok(cart)
    }
}
