// src/payment.rs
//
// Przekazanie do operatora płatności rozbite na dwie odpowiedzialności:
// 1. sparsowanie danych przekazania (JSON albo stary fragment HTML),
// 2. zbudowanie i wysłanie formularza przekierowania z tych danych.

use async_trait::async_trait;
use lol_html::{HtmlRewriter, Settings, element};
use maud::{Markup, PreEscaped, html};
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::errors::AppError;
use crate::models::PaymentHandoff;

/// Wyciąga dane przekazania ze starego formatu odpowiedzi `/orders`:
/// fragmentu HTML z auto-wysyłanym formularzem o dobrze znanym
/// identyfikatorze. Identyfikator zamówienia podróżuje w ukrytym polu
/// `order_id` tego formularza.
///
/// Brak formularza lub brak atrybutu `action` to błąd protokołu -
/// zamówienie może już istnieć po stronie serwera w stanie "oczekuje na
/// płatność", ale przekazanie nie jest możliwe.
pub fn parse_handoff_fragment(fragment: &str, form_id: &str) -> Result<PaymentHandoff, AppError> {
    let action_url: RefCell<Option<String>> = RefCell::new(None);
    let params: RefCell<BTreeMap<String, String>> = RefCell::new(BTreeMap::new());

    let form_selector = format!("form#{}", form_id);
    let input_selector = format!("form#{} input", form_id);

    let mut sink = Vec::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!(form_selector, |el| {
                    *action_url.borrow_mut() = el.get_attribute("action");
                    Ok(())
                }),
                element!(input_selector, |el| {
                    if let (Some(name), Some(value)) =
                        (el.get_attribute("name"), el.get_attribute("value"))
                    {
                        params.borrow_mut().insert(name, value);
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| sink.extend_from_slice(c),
    );

    rewriter
        .write(fragment.as_bytes())
        .map_err(|e| AppError::Internal(format!("Błąd przetwarzania fragmentu HTML: {}", e)))?;
    rewriter
        .end()
        .map_err(|e| AppError::Internal(format!("Błąd przetwarzania fragmentu HTML: {}", e)))?;

    let action_url = action_url.into_inner().ok_or_else(|| {
        tracing::error!(
            "Fragment odpowiedzi /orders nie zawiera formularza '{}' z atrybutem action",
            form_id
        );
        AppError::PaymentFormMissing
    })?;

    let params = params.into_inner();
    let order_id = params.get("order_id").cloned().unwrap_or_default();

    Ok(PaymentHandoff {
        order_id,
        action_url,
        params,
    })
}

/// Buduje auto-wysyłany formularz przekierowania do operatora płatności
/// z ustrukturyzowanych danych przekazania.
pub fn render_redirect_form(handoff: &PaymentHandoff, form_id: &str) -> Markup {
    html! {
        form id=(form_id) method="post" action=(handoff.action_url) {
            @for (name, value) in &handoff.params {
                input type="hidden" name=(name) value=(value);
            }
            noscript {
                button type="submit" { "Przejdź do płatności" }
            }
        }
        script {
            (PreEscaped(format!("document.getElementById('{}').submit();", form_id)))
        }
    }
}

/// Port nawigacji: dołączenie formularza do żywego dokumentu, jego wysłanie
/// (pełna nawigacja poza aplikację) i odłączenie to zadanie powłoki
/// osadzającej rdzeń. Testy podstawiają tu atrapę.
#[async_trait]
pub trait RedirectGate: Send + Sync {
    async fn navigate(&self, handoff: &PaymentHandoff, form_html: &str) -> Result<(), AppError>;
}

/// Brama domyślna dla środowisk bez przeglądarki: loguje przekazanie
/// zamiast nawigować.
pub struct TracingRedirectGate;

#[async_trait]
impl RedirectGate for TracingRedirectGate {
    async fn navigate(&self, handoff: &PaymentHandoff, _form_html: &str) -> Result<(), AppError> {
        tracing::info!(
            "Przekazanie do operatora płatności: zamówienie '{}', adres {}",
            handoff.order_id,
            handoff.action_url
        );
        Ok(())
    }
}
