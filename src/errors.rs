// src/errors.rs

use reqwest::StatusCode;
use thiserror::Error;
use validator::ValidationErrors;

/// Ujednolicony typ błędu całego rdzenia sklepu.
///
/// Komunikaty (`Display`) są tym, co widzi użytkownik - warstwa UI pokazuje
/// je bez dalszego tłumaczenia, dlatego są po polsku i kompletne.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Błędy walidacji")]
    ValidationError(#[from] ValidationErrors),

    #[error("Nieprawidłowe dane wejściowe: {0}")]
    Validation(String),

    #[error("Musisz być zalogowany, aby skorzystać z tej funkcji")]
    LoginRequired,

    #[error("Twój koszyk jest pusty")]
    EmptyCart,

    #[error("Nie znaleziono zasobu")]
    NotFound,

    // Błąd przejściowy sieci - stan został wycofany do ostatniej dobrej migawki.
    #[error("Błąd połączenia z serwerem sklepu: {0}")]
    Network(String),

    // Odpowiedź serwera z treścią - komunikat przekazujemy dosłownie.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Odpowiedź serwera nie zawiera formularza płatności")]
    PaymentFormMissing,

    // Drugi krok przenoszenia (usunięcie z listy życzeń) nie powiódł się;
    // pozycja istnieje teraz w obu listach. Zgłaszamy, nie naprawiamy.
    #[error(
        "Produkt został dodany do koszyka, ale nie udało się usunąć go z listy życzeń: {reason}"
    )]
    WishlistMoveIncomplete { reason: String },

    #[error("Błąd lokalnego magazynu danych: {0}")]
    Storage(String),

    #[error("Błąd przetwarzania danych: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Wewnętrzny błąd aplikacji: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Błąd sieci podczas komunikacji z API sklepu: {:?}", err);
        AppError::Network(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Spłaszcza błędy walidacji pól do jednego komunikatu dla użytkownika.
pub fn validation_messages(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let msg = error.message.as_ref().map_or_else(
                || format!("Pole '{}' jest nieprawidłowe", field),
                |m| format!("Pole '{}': {}", field, m),
            );
            messages.push(msg);
        }
    }
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_surfaces_server_message_verbatim() {
        let err = AppError::Api {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Kod rabatowy wygasł.".to_string(),
        };
        assert_eq!(err.to_string(), "Kod rabatowy wygasł.");
    }
}
