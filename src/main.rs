use std::time::Duration;

use anyhow::{Context, Result};
use flaglite::{models::FlagLiteOptions, Client};

#[tokio::main]
async fn main() -> Result<()> {
    let project = std::env::var("FLAGLITE_PROJECT_ID").context("FLAGLITE_PROJECT_ID is not set")?;
    let api_key = std::env::var("FLAGLITE_API_KEY").context("FLAGLITE_API_KEY is not set")?;

    let options = FlagLiteOptions {
        api_url: std::env::var("FLAGLITE_API_URL").ok(),
        env: std::env::var("FLAGLITE_ENV").ok(),
        refresh_interval: Some(Duration::from_secs(5)),
        ..FlagLiteOptions::new(project, api_key)
    }
    .with_on_update(|| println!("flags updated"))
    .with_on_error(|e| println!("flag fetch failed: {}", e));

    let client = Client::new(options)?;
    client.ready().await;
    println!("{:?}", client.snapshot());

    tokio::time::sleep(Duration::from_secs(12)).await;
    println!("{:?}", client.snapshot());

    client.stop();
    Ok(())
}
