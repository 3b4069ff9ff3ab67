//! Validation and payload construction for PIX charge requests.
//!
//! Only the tax-id and the amount can reject a request. Every other field
//! falls back to a fixed placeholder so a payment page always renders.

use crate::errors::AppError;
use crate::models::{
    DeliveryAddress, GatewayCustomer, GatewayDocument, GatewayProduct, GatewayRequest,
    PaymentParams,
};

pub const DEFAULT_TAX_ID: &str = "86825242016";
pub const DEFAULT_NAME: &str = "Omitted";
pub const DEFAULT_AMOUNT: &str = "68.56";
pub const DEFAULT_EMAIL: &str = "pagamento@api.com";
pub const DEFAULT_PHONE: &str = "(41) 3348-6452";
pub const DEFAULT_DESCRIPTION: &str = "Pagamento via API";

/// Keeps only ASCII digits.
pub fn strip_non_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A CPF is valid when exactly 11 digits remain after stripping formatting.
pub fn is_valid_tax_id(value: &str) -> bool {
    strip_non_digits(value).len() == 11
}

/// Parses a decimal amount. Non-finite values (`inf`, `NaN`) are rejected.
pub fn parse_amount(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

pub fn is_valid_amount(value: &str) -> bool {
    parse_amount(value).map_or(false, |amount| amount > 0.0)
}

/// `round(amount * 100)`, so `"68.56"` becomes `6856`.
pub fn amount_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Formats an 11-digit CPF as `000.000.000-00`; other inputs are returned digit-stripped.
pub fn format_cpf(value: &str) -> String {
    let digits = strip_non_digits(value);
    if digits.len() != 11 {
        return digits;
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Returns the value when present and non-empty, otherwise `default`.
fn or_default(value: Option<&str>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Gateway payload for a single charge together with the values it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltCharge {
    pub request: GatewayRequest,
    /// Digit-stripped CPF sent as the customer document.
    pub tax_id: String,
    pub name: String,
    pub amount_cents: i64,
}

pub struct PaymentIntentBuilder {
    delivery: DeliveryAddress,
}

impl Default for PaymentIntentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentIntentBuilder {
    pub fn new() -> Self {
        Self {
            delivery: DeliveryAddress {
                street: "Rua Manoel Pereira da Costa".to_string(),
                number: "715".to_string(),
                neighborhood: "Lagoa Azul".to_string(),
                city: "Natal".to_string(),
                state: "RN".to_string(),
                zipcode: "59138-860".to_string(),
            },
        }
    }

    /// Validates `params` and assembles the `POST /payments` body.
    ///
    /// # Errors
    ///
    /// * `AppError::Validation("CPF inválido")` when fewer or more than 11 digits remain.
    /// * `AppError::Validation("Valor inválido")` when the amount is not a positive number.
    pub fn build(&self, params: &PaymentParams) -> Result<BuiltCharge, AppError> {
        let tax_id = strip_non_digits(&or_default(params.cpf.as_deref(), DEFAULT_TAX_ID));
        if tax_id.len() != 11 {
            tracing::warn!("Rejected payment request: invalid CPF ({})", tax_id);
            return Err(AppError::Validation("CPF inválido".to_string()));
        }

        let raw_amount = or_default(params.valor.as_deref(), DEFAULT_AMOUNT);
        let amount = match parse_amount(&raw_amount) {
            Some(amount) if amount > 0.0 => amount,
            _ => {
                tracing::warn!("Rejected payment request: invalid amount ({})", raw_amount);
                return Err(AppError::Validation("Valor inválido".to_string()));
            }
        };
        let cents = amount_cents(amount);

        let name = or_default(params.nome.as_deref(), DEFAULT_NAME);
        let email = or_default(params.email.as_deref(), DEFAULT_EMAIL);
        let phone = or_default(params.phone.as_deref(), DEFAULT_PHONE);
        let description = or_default(params.descricao.as_deref(), DEFAULT_DESCRIPTION);

        tracing::debug!(
            "Building charge: cpf={}, nome={}, valor={}, email={}, phone={}, descricao={}",
            tax_id,
            name,
            raw_amount,
            email,
            phone,
            description
        );

        let request = GatewayRequest {
            amount: cents,
            method: "pix".to_string(),
            customer: GatewayCustomer {
                name: name.clone(),
                email,
                phone,
                document: GatewayDocument {
                    document_type: "CPF".to_string(),
                    value: tax_id.clone(),
                },
            },
            delivery: self.delivery.clone(),
            products: vec![GatewayProduct {
                name: description,
                price: cents,
                quantity: "1".to_string(),
                product_type: "digital".to_string(),
            }],
        };

        Ok(BuiltCharge {
            request,
            tax_id,
            name,
            amount_cents: cents,
        })
    }
}
