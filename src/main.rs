use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Result;
use currency_converter::api;
use currency_converter::conversion_history::User;
use currency_converter::exchange_client::ExchangeClient;
use currency_converter::store::{
    DatabasePool, HistoryStore, MemoryHistoryStore, MemoryRateStore, MemoryUserStore,
    PgHistoryStore, PgRateStore, PgUserStore, RateStore, UserStore,
};
use currency_converter::{Config, ConversionService};
use log::{info, warn};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    if config.provider.api_key.trim().is_empty() {
        warn!("OPEN_EXCHANGE_API_KEY is not set, conversions will fail");
    }

    let service = web::Data::new(build_service(&config).await?);
    let address = config.address();
    info!("Starting HTTP server on {address}");

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(middleware::Logger::default())
            .configure(api::configure)
    })
    .bind(&address)?
    .run()
    .await?;

    Ok(())
}

async fn build_service(config: &Config) -> Result<ConversionService> {
    let (rates, history, users): (Arc<dyn RateStore>, Arc<dyn HistoryStore>, Arc<dyn UserStore>) =
        match &config.database_url {
            Some(url) => {
                let db = DatabasePool::connect(url, config.database_max_connections).await?;
                db.migrate().await?;
                (
                    Arc::new(PgRateStore::new(&db)),
                    Arc::new(PgHistoryStore::new(&db)),
                    Arc::new(PgUserStore::new(&db)),
                )
            }
            None => {
                warn!("DATABASE_URL is not set, using in-memory stores");
                let rates = MemoryRateStore::new();
                let users = MemoryUserStore::new();
                if let Some(id) = config.default_user_id {
                    users
                        .insert(User {
                            id,
                            username: "default".into(),
                        })
                        .await;
                }
                let history = MemoryHistoryStore::new(rates.clone(), users.clone());
                (Arc::new(rates), Arc::new(history), Arc::new(users))
            }
        };

    let client = ExchangeClient::new(config.provider.clone(), rates.clone())?;

    Ok(ConversionService::new(
        Arc::new(client),
        rates,
        history,
        users,
        config.default_user_id,
    ))
}
