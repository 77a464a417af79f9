mod http_handler;

use std::sync::Arc;
use std::time::Duration;

use aivana_atoms::DynamoStore;
use aivana_shared::cloudinary::CloudinaryClient;
use aivana_shared::logging::init_logging;
use aivana_shared::stripe::StripeClient;
use aivana_shared::{AppState, Config};
use lambda_http::{run, service_fn, Error, Request};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    init_logging("info", config.log_format);

    let store = DynamoStore::connect(&config.table_name, &config.gallery_index, &config.owner_index).await?;
    tracing::info!(table = %config.table_name, "✅ document store reachable");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()?;
    let media = CloudinaryClient::new(
        http.clone(),
        &config.cloudinary_cloud_name,
        &config.cloudinary_api_key,
        &config.cloudinary_api_secret,
        &config.cloudinary_folder,
    );
    let payments = StripeClient::new(http, &config.stripe_secret_key);

    let state = Arc::new(AppState {
        store: Arc::new(store),
        media: Arc::new(media),
        payments: Arc::new(payments),
        config,
    });

    run(service_fn(move |event: Request| {
        let state = state.clone();
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
