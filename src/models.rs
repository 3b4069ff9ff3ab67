use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder printed whenever an upstream source lacks a field.
pub const NOT_INFORMED: &str = "Não informado";

// ============ Identity Models ============

/// Payer identity gathered from the identity and postal lookups.
///
/// `tax_id` is always the digit-stripped CPF the lookup was made with; every
/// other personal field carries [`NOT_INFORMED`] when the source omitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub tax_id: String,
    pub birth_date: String,
    pub sex: String,
    /// Present only when the postal lookup succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl IdentityRecord {
    /// Normalizes an identity lookup payload (`NOME`, `NASC`, `SEXO`).
    pub fn from_lookup(tax_id: &str, payload: &Value) -> Self {
        Self {
            name: text_field(payload, "NOME"),
            tax_id: tax_id.to_string(),
            birth_date: text_field(payload, "NASC"),
            sex: text_field(payload, "SEXO"),
            address: None,
        }
    }

    /// Additive merge: identity fields are kept, address fields are set.
    pub fn with_address(self, address: Address) -> Self {
        Self {
            address: Some(address),
            ..self
        }
    }

    /// Name usable as a payer name, i.e. not the placeholder.
    pub fn known_name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| *n != NOT_INFORMED && !n.trim().is_empty())
    }
}

/// Address fields merged from the postal-code lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postal: String,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl Address {
    /// Normalizes a postal lookup payload (`cep`, `logradouro`, `bairro`, `localidade`, `uf`).
    pub fn from_lookup(payload: &Value) -> Self {
        Self {
            postal: text_field(payload, "cep"),
            street: text_field(payload, "logradouro"),
            neighborhood: text_field(payload, "bairro"),
            city: text_field(payload, "localidade"),
            state: text_field(payload, "uf"),
        }
    }
}

/// Reads `key` from a JSON object as text.
///
/// Absent and null values become [`NOT_INFORMED`]; numbers and booleans are
/// rendered with their JSON text.
pub fn text_field(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        None | Some(Value::Null) => NOT_INFORMED.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============ Payment Models ============

/// Settlement status reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Unknown,
}

impl PaymentStatus {
    /// Parses the gateway's `status` field. Matching is exact, so anything
    /// other than the upper-case wire values is `Unknown`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("PENDING") => PaymentStatus::Pending,
            Some("PAID") => PaymentStatus::Paid,
            Some("FAILED") => PaymentStatus::Failed,
            _ => PaymentStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Unknown => "UNKNOWN",
        }
    }
}

/// A PIX charge as issued by the gateway. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway charge id; empty when the gateway did not return one.
    pub id: String,
    pub amount_cents: i64,
    pub pix_copy_paste: Option<String>,
    pub qr_code_url: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// An intent can be rendered and polled only when id, code and QR are all non-empty.
    pub fn is_usable(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the gateway fields that came back empty or absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.trim().is_empty() {
            missing.push("id");
        }
        if is_blank(&self.pix_copy_paste) {
            missing.push("pix.copypaste");
        }
        if is_blank(&self.qr_code_url) {
            missing.push("pix.qrcode");
        }
        missing
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// ============ Gateway Request Models ============

/// Body of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Amount in cents.
    pub amount: i64,
    pub method: String,
    pub customer: GatewayCustomer,
    pub delivery: DeliveryAddress,
    pub products: Vec<GatewayProduct>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document: GatewayDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayDocument {
    #[serde(rename = "type")]
    pub document_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayProduct {
    pub name: String,
    /// Unit price in cents.
    pub price: i64,
    pub quantity: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

// ============ API Request/Response Models ============

/// Query string of `GET /api/v1/consulta`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQueryParams {
    pub cpf: Option<String>,
    pub cep: Option<String>,
}

/// Query string of `GET /api/v1/pagamento`. Every field is optional and
/// falls back to a fixed default when missing or empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaymentParams {
    pub cpf: Option<String>,
    pub nome: Option<String>,
    pub valor: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub status: u16,
    pub message: String,
}

/// What the payer's page renders for a usable charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: String,
    pub pix_copy_paste: String,
    pub qr_code_url: String,
    pub amount_cents: i64,
    pub customer_name: String,
    /// CPF formatted as `000.000.000-00`.
    pub customer_document: String,
    pub status: PaymentStatus,
    /// Endpoint the page reads poll progress from.
    pub status_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_missing_fields_use_placeholder() {
        let record = IdentityRecord::from_lookup("12345678909", &json!({ "NOME": "Maria" }));

        assert_eq!(record.name, "Maria");
        assert_eq!(record.tax_id, "12345678909");
        assert_eq!(record.birth_date, NOT_INFORMED);
        assert_eq!(record.sex, NOT_INFORMED);
        assert!(record.address.is_none());
    }

    #[test]
    fn identity_ignores_upstream_cpf_echo() {
        let payload = json!({ "NOME": "Maria", "CPF": "00000000000", "NASC": null });
        let record = IdentityRecord::from_lookup("12345678909", &payload);

        assert_eq!(record.tax_id, "12345678909");
        assert_eq!(record.birth_date, NOT_INFORMED);
    }

    #[test]
    fn text_field_renders_scalars() {
        let payload = json!({ "n": 42, "b": true, "s": "" });
        assert_eq!(text_field(&payload, "n"), "42");
        assert_eq!(text_field(&payload, "b"), "true");
        assert_eq!(text_field(&payload, "s"), "");
    }

    #[test]
    fn address_merge_keeps_identity_fields() {
        let record = IdentityRecord::from_lookup("12345678909", &json!({ "NOME": "Ana" }));
        let merged = record.clone().with_address(Address::from_lookup(&json!({
            "cep": "59138-860",
            "localidade": "Natal"
        })));

        assert_eq!(merged.name, record.name);
        let address = merged.address.unwrap();
        assert_eq!(address.postal, "59138-860");
        assert_eq!(address.city, "Natal");
        assert_eq!(address.street, NOT_INFORMED);
    }

    #[test]
    fn known_name_skips_placeholder() {
        let record = IdentityRecord::from_lookup("12345678909", &json!({}));
        assert_eq!(record.known_name(), None);
    }

    #[test]
    fn status_parsing_defaults_to_unknown() {
        assert_eq!(PaymentStatus::from_wire(Some("PAID")), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_wire(Some("PENDING")), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_wire(Some("FAILED")), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_wire(Some("REFUNDED")), PaymentStatus::Unknown);
        assert_eq!(PaymentStatus::from_wire(None), PaymentStatus::Unknown);
    }

    #[test]
    fn status_parsing_is_case_sensitive() {
        assert_eq!(PaymentStatus::from_wire(Some("paid")), PaymentStatus::Unknown);
        assert_eq!(PaymentStatus::from_wire(Some("Paid")), PaymentStatus::Unknown);
        assert_eq!(PaymentStatus::from_wire(Some(" PAID")), PaymentStatus::Unknown);
        assert_eq!(PaymentStatus::from_wire(Some("pending")), PaymentStatus::Unknown);
    }

    #[test]
    fn intent_usability_requires_all_three_fields() {
        let mut intent = PaymentIntent {
            id: "x1".to_string(),
            amount_cents: 6856,
            pix_copy_paste: Some("00020126".to_string()),
            qr_code_url: Some("https://gateway.test/qr.png".to_string()),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        assert!(intent.is_usable());

        intent.qr_code_url = Some("  ".to_string());
        assert!(!intent.is_usable());
        assert_eq!(intent.missing_fields(), vec!["pix.qrcode"]);

        intent.id.clear();
        assert_eq!(intent.missing_fields(), vec!["id", "pix.qrcode"]);
    }
}
