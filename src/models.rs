// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Identyfikatory przychodzą z API i ze starych zapisów lokalnych "luźno" -
/// raz jako liczba, raz jako łańcuch ("42"). Normalizujemy je do `i64` już na
/// granicy deserializacji; wartość nienumeryczna to błąd, nie ciche zero.
fn deserialize_loose_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LooseNumber {
        Num(i64),
        Text(String),
    }

    match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Num(n) => Ok(n),
        LooseNumber::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            de::Error::custom(format!("identyfikator lub kwota '{}' nie jest liczbą", s))
        }),
    }
}

fn deserialize_loose_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_loose_i64(deserializer)?;
    u32::try_from(value)
        .map_err(|_| de::Error::custom(format!("ilość '{}' jest poza zakresem", value)))
}

/// Krotka tożsamości pozycji: (produkt, kolor, rozmiar).
/// Dwa dodania z tym samym kluczem to ta sama linia koszyka.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub product_id: i64,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub color_id: i64,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub size_id: i64,
}

// --- STRUKTURY KOSZYKA ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub unit_price: i64,
    #[serde(deserialize_with = "deserialize_loose_u32")]
    pub quantity: u32,
    pub color_name: String,
    pub hex_code: String,
    pub size_name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub amount: i64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub subtotal: i64,
    #[serde(default)]
    pub discount: Discount,
    pub total_amount: i64,
}

impl Cart {
    /// Odtwarza sumy pochodne z pozycji. Wywoływane po każdej mutacji
    /// lokalnej; zwykły odczyt zwraca wartość zapisaną bez przeliczania.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .map(|item| item.unit_price * i64::from(item.quantity))
            .sum();
        self.total_amount = self.subtotal - self.discount.amount;
    }

    /// Dodaje pozycję albo zwiększa ilość istniejącej linii o tym samym
    /// kluczu tożsamości. Nigdy nie powstaje druga linia z tym samym kluczem.
    pub fn add_or_increment(&mut self, new_item: NewCartItem) {
        if let Some(existing) = self.items.iter_mut().find(|item| item.key == new_item.key) {
            existing.quantity += new_item.quantity;
        } else {
            self.items.push(CartItem {
                id: Uuid::new_v4(),
                key: new_item.key,
                name: new_item.name,
                unit_price: new_item.unit_price,
                quantity: new_item.quantity,
                color_name: new_item.color_name,
                hex_code: new_item.hex_code,
                size_name: new_item.size_name,
                image_url: new_item.image_url,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pozycja wchodząca do koszyka - jeszcze bez nadanego identyfikatora linii.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCartItem {
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub unit_price: i64,
    #[serde(deserialize_with = "deserialize_loose_u32")]
    pub quantity: u32,
    pub color_name: String,
    pub hex_code: String,
    pub size_name: String,
    pub image_url: String,
}

/// Payload PATCH dla pozycji koszyka: zmiana ilości lub wariantu rozmiaru.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCartItemPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_name: Option<String>,
}

// --- STRUKTURY LISTY ŻYCZEŃ ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub price: i64,
    pub color_name: String,
    pub hex_code: String,
    pub size_name: String,
    pub image_url: String,
    /// `None` oznacza "nie udało się sprawdzić", NIE "brak na stanie".
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wishlist {
    pub items: Vec<WishlistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWishlistItem {
    #[serde(flatten)]
    pub key: ProductKey,
    pub name: String,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub price: i64,
    pub color_name: String,
    pub hex_code: String,
    pub size_name: String,
    pub image_url: String,
}

/// Wiersz odpowiedzi zbiorczego sprawdzenia stanów magazynowych.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStock {
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub product_id: i64,
    pub stock_quantity: i64,
}

// --- STRUKTURY ZAMÓWIENIA I CHECKOUTU ---

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some("pole nie może być puste".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentMethod {
    Blik,
    Card,
    Transfer,
}

/// Status zamówienia
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,    // Oczekujące (np. na płatność)
    Processing, // W trakcie realizacji
    Shipped,    // Wysłane
    Delivered,  // Dostarczone
    Cancelled,  // Anulowane
}

/// Dane wysyłki zbierane przed złożeniem zamówienia. Walidacja odbywa się
/// po stronie klienta, zanim wykonamy jakiekolwiek żądanie sieciowe.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(
        length(min = 1, max = 100, message = "Imię jest wymagane"),
        custom(function = not_blank)
    )]
    pub shipping_first_name: String,

    #[validate(
        length(min = 1, max = 100, message = "Nazwisko jest wymagane"),
        custom(function = not_blank)
    )]
    pub shipping_last_name: String,

    #[validate(
        length(min = 1, max = 255, message = "Linia adresu wysyłki jest wymagana"),
        custom(function = not_blank)
    )]
    pub shipping_address_line1: String,

    #[validate(length(max = 255))]
    pub shipping_address_line2: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "Miasto wysyłki jest wymagane"),
        custom(function = not_blank)
    )]
    pub shipping_city: String,

    #[validate(
        length(min = 1, max = 20, message = "Kod pocztowy wysyłki jest wymagany"),
        custom(function = not_blank)
    )]
    pub shipping_postal_code: String,

    #[validate(
        length(min = 1, max = 100, message = "Kraj wysyłki jest wymagany"),
        custom(function = not_blank)
    )]
    pub shipping_country: String,

    #[validate(
        length(min = 1, max = 30, message = "Numer telefonu jest wymagany"),
        custom(function = not_blank)
    )]
    pub shipping_phone: String,

    pub payment_method: PaymentMethod,
}

/// Pozycja zamówienia osadzana w payloadzie anonimowego checkoutu.
/// Wszystkie pola są już znormalizowane do typów liczbowych.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemPayload {
    pub product_id: i64,
    pub color_id: i64,
    pub size_id: i64,
    pub price: i64,
    pub quantity: u32,
}

impl From<&CartItem> for OrderItemPayload {
    fn from(item: &CartItem) -> Self {
        OrderItemPayload {
            product_id: item.key.product_id,
            color_id: item.key.color_id,
            size_id: item.key.size_id,
            price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// Payload POST /orders. Zalogowany użytkownik wysyła same dane wysyłki
/// (serwer odtwarza koszyk z sesji); gość dokłada pełną listę pozycji.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderPayload {
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_items: Option<Vec<OrderItemPayload>>,
}

/// Ustrukturyzowane dane przekazania do operatora płatności:
/// identyfikator zamówienia plus adres i parametry formularza przekierowania.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHandoff {
    pub order_id: String,
    pub action_url: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummaryItem {
    pub name: String,
    #[serde(deserialize_with = "deserialize_loose_i64")]
    pub unit_price: i64,
    #[serde(deserialize_with = "deserialize_loose_u32")]
    pub quantity: u32,
}

/// Widok zamówienia do ekranu potwierdzenia - tylko do odczytu,
/// zamówienie po złożeniu jest niemutowalne.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: String,
    pub status: OrderStatus,
    pub total_price: i64,
    pub shipping_first_name: String,
    pub shipping_last_name: String,
    pub shipping_address_line1: String,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub items: Vec<OrderSummaryItem>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: i64, price: i64, quantity: u32) -> NewCartItem {
        NewCartItem {
            key: ProductKey {
                product_id,
                color_id: 1,
                size_id: 2,
            },
            name: format!("Produkt {}", product_id),
            unit_price: price,
            quantity,
            color_name: "Czarny".to_string(),
            hex_code: "#000000".to_string(),
            size_name: "M".to_string(),
            image_url: "https://cdn.example.com/p.jpg".to_string(),
        }
    }

    #[test]
    fn loose_ids_normalize_to_the_same_key() {
        let from_numbers: ProductKey =
            serde_json::from_str(r#"{"product_id": 7, "color_id": 3, "size_id": 1}"#).unwrap();
        let from_strings: ProductKey =
            serde_json::from_str(r#"{"product_id": "7", "color_id": "3", "size_id": "1"}"#)
                .unwrap();
        assert_eq!(from_numbers, from_strings);
    }

    #[test]
    fn non_numeric_id_is_a_deserialization_error() {
        let result: Result<ProductKey, _> =
            serde_json::from_str(r#"{"product_id": "abc", "color_id": 3, "size_id": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn add_or_increment_never_duplicates_a_line() {
        let mut cart = Cart::default();
        cart.add_or_increment(item(7, 1000, 2));
        cart.add_or_increment(item(7, 1000, 3));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);

        cart.add_or_increment(item(8, 500, 1));
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn recompute_totals_matches_item_sum() {
        let mut cart = Cart::default();
        cart.add_or_increment(item(7, 1000, 2));
        cart.add_or_increment(item(8, 250, 4));
        cart.recompute_totals();
        assert_eq!(cart.subtotal, 3000);
        assert_eq!(cart.total_amount, 3000);
    }

    #[test]
    fn blank_shipping_field_fails_validation() {
        let shipping = ShippingInfo {
            shipping_first_name: "   ".to_string(),
            shipping_last_name: "Kowalska".to_string(),
            shipping_address_line1: "ul. Prosta 1".to_string(),
            shipping_address_line2: None,
            shipping_city: "Warszawa".to_string(),
            shipping_postal_code: "00-001".to_string(),
            shipping_country: "Polska".to_string(),
            shipping_phone: "+48123456789".to_string(),
            payment_method: PaymentMethod::Blik,
        };
        assert!(shipping.validate().is_err());
    }
}
