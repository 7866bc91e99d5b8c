use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use currency_converter::api;
use currency_converter::config::ProviderConfig;
use currency_converter::conversion_history::User;
use currency_converter::exchange_client::ExchangeClient;
use currency_converter::store::{MemoryHistoryStore, MemoryRateStore, MemoryUserStore};
use currency_converter::ConversionService;
use serde_json::{Value, json};

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const LATEST: &str = r#"{
        "timestamp": 1746957600,
        "base": "USD",
        "rates": {"USD": 1.0, "EUR": 0.92, "JPY": 155.4}
    }"#;

    pub async fn create_mock_provider(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/latest.json"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }
}

async fn service(provider_url: &str, api_key: &str) -> web::Data<ConversionService> {
    let rates = MemoryRateStore::new();
    let users = MemoryUserStore::new();
    users
        .insert(User {
            id: 1,
            username: "default".into(),
        })
        .await;
    let history = MemoryHistoryStore::new(rates.clone(), users.clone());
    let client = ExchangeClient::new(
        ProviderConfig::new(&format!("{provider_url}/api"), api_key),
        Arc::new(rates.clone()),
    )
    .unwrap();

    web::Data::new(ConversionService::new(
        Arc::new(client),
        Arc::new(rates),
        Arc::new(history),
        Arc::new(users),
        Some(1),
    ))
}

macro_rules! app {
    ($data:expr) => {
        test::init_service(App::new().app_data($data).configure(api::configure)).await
    };
}

async fn error_kind(resp: ServiceResponse) -> String {
    let body: Value = test::read_body_json(resp).await;
    body["error"].as_str().unwrap_or_default().to_string()
}

#[actix_web::test]
async fn test_post_convert_and_query_history() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    let req = test::TestRequest::post()
        .uri("/api/convert")
        .set_json(json!({"from": "usd", "to": "eur", "amount": 100.0}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["fromCurrency"], "USD");
    assert_eq!(body["toCurrency"], "EUR");
    assert!((body["convertedAmount"].as_f64().unwrap() - 92.0).abs() < 1e-9);

    let req = test::TestRequest::get()
        .uri("/api/history?currency=usd")
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    let records = history.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "COMPLETED");
    assert_eq!(records[0]["notes"], "Automated conversion");
    assert_eq!(records[0]["user"]["id"], 1);
    assert_eq!(records[0]["currencyRates"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/to-history?currency=EUR")
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/history/1").to_request();
    let record: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(record["id"], 1);
    assert_eq!(record["amount"], 100.0);

    let req = test::TestRequest::get()
        .uri("/api/history/user/1")
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_get_convert_query_style() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    let req = test::TestRequest::get()
        .uri("/convert?from=EUR&to=JPY&amount=92")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["fromCurrency"], "EUR");
    assert_eq!(body["toCurrency"], "JPY");
    assert!((body["convertedAmount"].as_f64().unwrap() - 15540.0).abs() < 1e-6);
}

#[actix_web::test]
async fn test_convert_validation_errors() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    for body in [
        json!({"from": "USD", "to": "EUR", "amount": 0}),
        json!({"from": "USD", "to": "EUR", "amount": -1.5}),
        json!({"from": " ", "to": "EUR", "amount": 10}),
        json!({"from": "USD", "amount": 10}),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/convert")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(error_kind(resp).await, "validation_error");
    }

    let req = test::TestRequest::post()
        .uri("/api/convert")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/convert?from=USD&to=EUR&amount=abc")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/convert?from=USD&to=EUR")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_convert_without_api_key_is_processing_error() {
    let app = app!(service("http://127.0.0.1:9", "").await);

    let req = test::TestRequest::post()
        .uri("/api/convert")
        .set_json(json!({"from": "USD", "to": "EUR", "amount": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_kind(resp).await, "processing_error");
}

#[actix_web::test]
async fn test_convert_upstream_failure_is_processing_error() {
    let provider = test_utils::create_mock_provider(503, "unavailable").await;
    let app = app!(service(&provider.uri(), "secret").await);

    let req = test::TestRequest::get()
        .uri("/convert?from=USD&to=EUR&amount=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let req = test::TestRequest::get().uri("/api/history/sorted").to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_history_lookups() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    let req = test::TestRequest::get().uri("/api/history/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/history/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/history-by-date?date=yesterday")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/history-by-date?date=2025-05-11T10:00:00")
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_paged_history_defaults() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    for amount in [1, 2, 3] {
        let req = test::TestRequest::post()
            .uri("/api/convert")
            .set_json(json!({"from": "USD", "to": "EUR", "amount": amount}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/api/history/paged").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["page"], 0);
    assert_eq!(page["size"], 10);
    assert_eq!(page["totalElements"], 3);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["content"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/history/paged?page=1&size=2")
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["content"].as_array().unwrap().len(), 1);
    assert_eq!(page["content"][0]["id"], 3);

    let req = test::TestRequest::get()
        .uri("/api/history/paged?size=0")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/history/paged?page=4611686018427387904&size=10")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(resp).await, "validation_error");
}

#[actix_web::test]
async fn test_history_update_and_delete() {
    let provider = test_utils::create_mock_provider(200, test_utils::LATEST).await;
    let app = app!(service(&provider.uri(), "secret").await);

    let req = test::TestRequest::post()
        .uri("/api/convert")
        .set_json(json!({"from": "USD", "to": "EUR", "amount": 5}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let update = json!({
        "fromCurrency": "USD",
        "toCurrency": "EUR",
        "amount": 5.0,
        "convertedAmount": 4.6,
        "convertedAt": "2025-05-11T10:00:00",
        "notes": "manual fix",
        "status": "FAILED",
        "userId": 1,
        "currencyCodes": ["EUR"]
    });
    let req = test::TestRequest::put()
        .uri("/api/history/1")
        .set_json(&update)
        .to_request();
    let record: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(record["status"], "FAILED");
    assert_eq!(record["convertedAt"], "2025-05-11T10:00:00");

    let req = test::TestRequest::put()
        .uri("/api/history/9")
        .set_json(&update)
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    let req = test::TestRequest::delete().uri("/api/history/1").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete().uri("/api/history/1").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );

    // the referenced rate is not removed with the record
    let req = test::TestRequest::get()
        .uri("/api/currency-rates/EUR")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_currency_rate_crud() {
    let app = app!(service("http://127.0.0.1:9", "").await);

    let req = test::TestRequest::post()
        .uri("/api/currency-rates")
        .set_json(json!({"currencyCode": "eur", "rate": 0.92}))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["code"], "EUR");
    assert_eq!(created["source"], "manual");

    let req = test::TestRequest::get()
        .uri("/api/currency-rates/EUR")
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["rate"], 0.92);

    let req = test::TestRequest::put()
        .uri("/api/currency-rates/eur")
        .set_json(json!({"rate": 0.95, "source": "ecb"}))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["rate"], 0.95);
    assert_eq!(updated["source"], "ecb");

    let req = test::TestRequest::get().uri("/api/currency-rates").to_request();
    let all: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri("/api/currency-rates/EUR")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    for req in [
        test::TestRequest::get().uri("/api/currency-rates/EUR"),
        test::TestRequest::delete().uri("/api/currency-rates/EUR"),
        test::TestRequest::put()
            .uri("/api/currency-rates/EUR")
            .set_json(json!({"rate": 1.0})),
    ] {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let req = test::TestRequest::post()
        .uri("/api/currency-rates")
        .set_json(json!({"code": "", "rate": 1.0}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
