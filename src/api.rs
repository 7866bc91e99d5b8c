//! HTTP routes.

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::conversion_history::HistoryUpdate;
use crate::error::{AppError, Result};
use crate::exchange_rate::{CurrencyRateUpdate, NewCurrencyRate};
use crate::service::{ConversionService, ConvertRequest};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CurrencyQuery {
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Registers every route plus extractor configs that turn malformed bodies,
/// query strings and path segments into validation errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::Validation(format!("Invalid request body: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::Validation(format!("Invalid query parameters: {err}")).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::Validation(format!("Invalid path parameter: {err}")).into()
    }))
    .route("/convert", web::get().to(convert_query))
    .service(
        web::scope("/api")
            .route("/convert", web::post().to(convert))
            .route("/history", web::get().to(history_by_currency))
            .route("/to-history", web::get().to(history_to_currency))
            .route("/history-by-date", web::get().to(history_by_date))
            .route("/history/sorted", web::get().to(history_sorted))
            .route("/history/paged", web::get().to(history_paged))
            .route("/history/user/{user_id}", web::get().to(history_by_user))
            .service(
                web::resource("/history/{id}")
                    .route(web::get().to(history_by_id))
                    .route(web::put().to(update_history))
                    .route(web::delete().to(delete_history)),
            )
            .service(
                web::resource("/currency-rates")
                    .route(web::get().to(list_rates))
                    .route(web::post().to(create_rate)),
            )
            .service(
                web::resource("/currency-rates/{code}")
                    .route(web::get().to(get_rate))
                    .route(web::put().to(update_rate))
                    .route(web::delete().to(delete_rate)),
            ),
    );
}

async fn convert(
    service: web::Data<ConversionService>,
    body: web::Json<ConvertRequest>,
) -> Result<HttpResponse> {
    let result = service.convert(&body).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn convert_query(
    service: web::Data<ConversionService>,
    params: web::Query<ConvertRequest>,
) -> Result<HttpResponse> {
    let result = service.convert(&params).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn history_by_currency(
    service: web::Data<ConversionService>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse> {
    let history = service.history_by_from_currency(&query.currency).await?;
    Ok(HttpResponse::Ok().json(history))
}

async fn history_to_currency(
    service: web::Data<ConversionService>,
    query: web::Query<CurrencyQuery>,
) -> Result<HttpResponse> {
    let history = service.history_by_to_currency(&query.currency).await?;
    Ok(HttpResponse::Ok().json(history))
}

async fn history_by_date(
    service: web::Data<ConversionService>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse> {
    let history = service.history_by_date(&query.date).await?;
    Ok(HttpResponse::Ok().json(history))
}

async fn history_by_id(
    service: web::Data<ConversionService>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    let record = service.history_by_id(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn update_history(
    service: web::Data<ConversionService>,
    id: web::Path<i64>,
    body: web::Json<HistoryUpdate>,
) -> Result<HttpResponse> {
    let record = service
        .update_history(id.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn delete_history(
    service: web::Data<ConversionService>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    service.delete_history(id.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

async fn history_by_user(
    service: web::Data<ConversionService>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let history = service.history_by_user(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

async fn history_sorted(service: web::Data<ConversionService>) -> Result<HttpResponse> {
    let history = service.history_sorted().await?;
    Ok(HttpResponse::Ok().json(history))
}

async fn history_paged(
    service: web::Data<ConversionService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let page = service.history_page(query.page, query.size).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn list_rates(service: web::Data<ConversionService>) -> Result<HttpResponse> {
    let rates = service.list_rates().await?;
    Ok(HttpResponse::Ok().json(rates))
}

async fn get_rate(
    service: web::Data<ConversionService>,
    code: web::Path<String>,
) -> Result<HttpResponse> {
    let rate = service.get_rate(&code).await?;
    Ok(HttpResponse::Ok().json(rate))
}

async fn create_rate(
    service: web::Data<ConversionService>,
    body: web::Json<NewCurrencyRate>,
) -> Result<HttpResponse> {
    let rate = service.create_rate(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rate))
}

async fn update_rate(
    service: web::Data<ConversionService>,
    code: web::Path<String>,
    body: web::Json<CurrencyRateUpdate>,
) -> Result<HttpResponse> {
    let rate = service.update_rate(&code, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rate))
}

async fn delete_rate(
    service: web::Data<ConversionService>,
    code: web::Path<String>,
) -> Result<HttpResponse> {
    service.delete_rate(&code).await?;
    Ok(HttpResponse::Ok().finish())
}
