//! The `parlor-server` binary.

use parlor::{ParlorError, ParlorServerBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ParlorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("PARLOR_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:9000".to_string());

    let server = ParlorServerBuilder::new().bind(&addr).build().await?;
    tracing::info!(%addr, "parlor listening");
    server.run().await
}
