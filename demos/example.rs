use serde::Deserialize;
use session_client::{ApiClient, Config, Listing, OutboundRequest};

#[derive(Debug, Deserialize)]
struct Product {
    id: u64,
    name: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the example
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Load configuration from a JSON file placed next to the binary
    let cfg = Config::from_file("config.json")?;
    let client = ApiClient::new(cfg)?;

    if !client.check_auth_status().await {
        eprintln!("no active session, sign in first");
        return Ok(());
    }

    let products: Listing<Product> = client
        .list(OutboundRequest::get("/products/").query("page", 1))
        .await?;
    for p in products.items() {
        println!("{} {}", p.id, p.name);
    }

    let outcome = client.logout().await;
    println!("server invalidated: {}", outcome.server_invalidated());
    Ok(())
}
