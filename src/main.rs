use hemmer_provider_arangodb::{init_logging, serve, ArangoProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let provider = ArangoProvider::new(env!("CARGO_PKG_VERSION"));
    tracing::info!(version = provider.version(), "Starting ArangoDB provider");
    serve(provider).await
}
