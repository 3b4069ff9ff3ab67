/// HTTP-level tests: the full router against mocked upstream services
use axum::body::{to_bytes, Body};
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    Request, StatusCode,
};
use axum::Router;
use rust_pix_api::api::router;
use rust_pix_api::config::Config;
use rust_pix_api::errors::PIX_UNAVAILABLE_MESSAGE;
use rust_pix_api::handlers::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_app(base_url: String) -> Router {
    let config = Config {
        port: 8080,
        identity_api_url: base_url.clone(),
        identity_api_token: "identity_token".to_string(),
        postal_api_url: base_url.clone(),
        gateway_url: base_url,
        gateway_secret: "gateway_secret".to_string(),
        gateway_status_token: "status_token".to_string(),
        notification_url: None,
        notification_channel: "pix".to_string(),
        redirect_url: "https://confirm.test/obg/".to_string(),
        session_ttl_secs: 60,
    };
    router(Arc::new(AppState::new(config).unwrap()))
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, set_cookie, body)
}

async fn mount_pending_charge(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x1",
            "pix": { "copypaste": "00020126", "qrcode": "https://gateway.test/qr.png" }
        })))
        .mount(mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payment-status/x1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "PENDING" })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let app = test_app("http://127.0.0.1:9".to_string());
    let (status, _, body) = get(&app, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_lookup_requires_cpf() {
    let app = test_app("http://127.0.0.1:9".to_string());
    let (status, _, body) = get(&app, "/api/v1/consulta", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CPF é obrigatório.");
}

#[tokio::test]
async fn test_lookup_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cpf/12345678909"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&mock_server)
        .await;

    let app = test_app(mock_server.uri());
    let (status, _, body) = get(&app, "/api/v1/consulta?cpf=12345678909", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "CPF não encontrado.");
}

#[tokio::test]
async fn test_lookup_then_payment_uses_session_identity() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cpf/12345678909"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "NOME": "João da Silva" })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/59138860.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "erro": true })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(body_partial_json(json!({
            "amount": 1000,
            "customer": {
                "name": "João da Silva",
                "document": { "type": "CPF", "value": "12345678909" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x1",
            "pix": { "copypaste": "00020126", "qrcode": "https://gateway.test/qr.png" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payment-status/x1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "PENDING" })))
        .mount(&mock_server)
        .await;

    let app = test_app(mock_server.uri());

    let (status, cookie, body) = get(
        &app,
        "/api/v1/consulta?cpf=123.456.789-09&cep=59138-860",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Dados salvos.");
    let cookie = cookie.expect("session cookie issued");
    assert!(cookie.starts_with("pix_session="));

    let (status, new_cookie, body) = get(&app, "/api/v1/pagamento?valor=10", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(new_cookie.is_none());
    assert_eq!(body["id"], "x1");
    assert_eq!(body["amount_cents"], 1000);
    assert_eq!(body["customer_name"], "João da Silva");
    assert_eq!(body["customer_document"], "123.456.789-09");
    assert_eq!(body["pix_copy_paste"], "00020126");

    let (status, _, snapshot) = get(&app, "/api/v1/pagamento/x1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["intent_id"], "x1");
    assert_eq!(snapshot["max_attempts"], 200);
}

#[tokio::test]
async fn test_payment_rejects_invalid_amount() {
    let app = test_app("http://127.0.0.1:9".to_string());
    let (status, _, body) = get(&app, "/api/v1/pagamento?cpf=12345678909&valor=abc", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Valor inválido");
}

#[tokio::test]
async fn test_payment_rejects_invalid_cpf() {
    let app = test_app("http://127.0.0.1:9".to_string());
    let (status, _, body) = get(&app, "/api/v1/pagamento?cpf=123", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CPF inválido");
}

#[tokio::test]
async fn test_payment_without_qrcode_shows_failure_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "x1",
            "pix": { "copypaste": "00020126" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = test_app(mock_server.uri());
    let (status, _, body) = get(&app, "/api/v1/pagamento?nome=Maria", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], PIX_UNAVAILABLE_MESSAGE);

    let (status, _, _) = get(&app, "/api/v1/pagamento/x1/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_gateway_failure_is_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let app = test_app(mock_server.uri());
    let (status, _, body) = get(&app, "/api/v1/pagamento", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_payment_default_parameters() {
    let mock_server = MockServer::start().await;
    mount_pending_charge(&mock_server).await;

    let app = test_app(mock_server.uri());
    let (status, _, body) = get(&app, "/api/v1/pagamento", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount_cents"], 6856);
    assert_eq!(body["customer_name"], "Omitted");
    assert_eq!(body["customer_document"], "868.252.420-16");
}
