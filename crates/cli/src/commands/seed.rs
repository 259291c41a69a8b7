//! Seed the remote backend with demo customers and products.
//!
//! The file is JSON in the backend's own field names:
//!
//! ```json
//! {
//!   "customers": [
//!     { "name": "Alice", "surname": "Doe", "username": "alice",
//!       "email": "alice@example.com", "shippingAddress": "1 Main St" }
//!   ],
//!   "products": [
//!     { "productName": "Mug", "price": 9.5, "stockAvailable": 10 }
//!   ]
//! }
//! ```

use std::path::Path;

use retail_storefront::backend::{BackendClient, CustomerInput, ProductInput};
use retail_storefront::config::BackendConfig;
use serde::Deserialize;
use tracing::{error, info};

/// Seed file contents.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub customers: Vec<CustomerInput>,
    pub products: Vec<ProductInput>,
}

/// Create every customer and product listed in `file_path`.
///
/// Customers whose username already exists in the backend are skipped.
/// Individual failures are logged and counted; seeding continues.
///
/// # Errors
///
/// Returns an error if configuration is missing, the file cannot be read or
/// parsed, or existing customers cannot be listed.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog seed from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_json::from_str(&content)?;
    info!(
        customers = seed.customers.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let client = BackendClient::new(&BackendConfig::from_env()?)?;
    let existing: Vec<String> = client
        .list_customers()
        .await?
        .into_iter()
        .map(|c| c.username)
        .collect();

    let mut created = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for customer in &seed.customers {
        if existing.contains(&customer.username) {
            skipped += 1;
            continue;
        }
        match client.create_customer(customer).await {
            Ok(id) => {
                info!("  customer {} -> {}", customer.username, id);
                created += 1;
            }
            Err(e) => {
                error!("  customer {}: {e}", customer.username);
                failed += 1;
            }
        }
    }

    for product in &seed.products {
        match client.create_product(product).await {
            Ok(id) => {
                info!("  product {} -> {}", product.product_name, id);
                created += 1;
            }
            Err(e) => {
                error!("  product {}: {e}", product.product_name);
                failed += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Created: {created}");
    info!("  Skipped (already exist): {skipped}");
    if failed > 0 {
        error!("  Failed: {failed}");
    }

    Ok(())
}
