//! Courier demo server
//!
//! Seeds one restaurant and two riders, prints development tokens, then
//! serves the REST and WebSocket API.
//!
//! ```text
//! cargo run --example courier_server [-- courier.yaml]
//! ```

use anyhow::Result;
use courier::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,courier=debug")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => CourierConfig::from_yaml_file(&path)?,
        None => CourierConfig::default_config(),
    };
    config.apply_env_overrides();
    if config.auth.operator_key.is_none() {
        config.auth.operator_key = Some("demo-operator".to_string());
    }

    let catalog = InMemoryCatalogStore::new();
    seed_catalog(&catalog)?;

    let verifier = JwtVerifier::new(config.auth.jwt_secret.as_bytes());
    let ttl = chrono::Duration::seconds(config.auth.token_ttl_secs as i64);
    let bind = config.server.bind.clone();

    println!("🚀 Courier demo on http://{}", bind);
    println!("\n🔑 Development tokens:");
    for (actor, role) in [
        ("cust-1", Role::Customer),
        ("rest-1", Role::Restaurant),
        ("rider-1", Role::Rider),
        ("rider-2", Role::Rider),
    ] {
        println!("   {:<8} {:<10} {}", actor, role, verifier.issue(actor, role, ttl)?);
    }
    println!(
        "   operator   x-operator-key: {}",
        config.auth.operator_key.as_deref().unwrap_or_default()
    );

    println!("\n📚 Routes:");
    println!("   WS     /ws?token=<jwt>[&zoneId=<zone>]");
    println!("   POST   /orders");
    println!("   GET    /orders/{{id}}");
    println!("   POST   /orders/{{id}}/accept|assign|pick|deliver|cancel");
    println!("   GET    /orders/{{id}}/messages");
    println!("   POST   /orders/{{id}}/messages");
    println!("   GET    /notifications");
    println!("   POST   /notifications            (operator)");
    println!("   POST   /notifications/{{id}}/read");
    println!("   GET    /device-tokens");
    println!("   POST   /device-tokens");
    println!("   DELETE /device-tokens/{{id}}");
    println!("   GET    /stats");
    println!();

    ServerBuilder::new()
        .with_config(config)
        .with_verifier(verifier)
        .with_catalog_store(catalog)
        .serve(&bind)
        .await
}

fn seed_catalog(catalog: &InMemoryCatalogStore) -> Result<()> {
    catalog.put_restaurant(Restaurant {
        id: "rest-1".to_string(),
        name: "Burger Barn".to_string(),
        zone_id: "zone-a".to_string(),
        active: true,
        available: true,
        minimum_order: Decimal::new(1000, 2),
        preparation_minutes: 20,
        menu: vec![
            Food {
                id: "burger".to_string(),
                title: "Burger".to_string(),
                out_of_stock: false,
                variations: vec![
                    Variation {
                        id: "regular".to_string(),
                        title: "Regular".to_string(),
                        price: Decimal::new(1250, 2),
                        discounted: None,
                        out_of_stock: false,
                    },
                    Variation {
                        id: "double".to_string(),
                        title: "Double".to_string(),
                        price: Decimal::new(1650, 2),
                        discounted: Some(Decimal::new(1500, 2)),
                        out_of_stock: false,
                    },
                ],
            },
            Food {
                id: "fries".to_string(),
                title: "Fries".to_string(),
                out_of_stock: false,
                variations: vec![Variation {
                    id: "large".to_string(),
                    title: "Large".to_string(),
                    price: Decimal::new(450, 2),
                    discounted: None,
                    out_of_stock: false,
                }],
            },
        ],
    })?;

    for id in ["rider-1", "rider-2"] {
        catalog.put_rider(Rider {
            id: id.to_string(),
            name: format!("Rider {}", id),
            zone_id: "zone-a".to_string(),
            available: true,
        })?;
    }

    catalog.put_coupon(Coupon {
        code: "WELCOME10".to_string(),
        discount: Discount::Percentage(Decimal::new(10, 0)),
        max_discount: Some(Decimal::new(500, 2)),
        enabled: true,
        starts_at: None,
        ends_at: None,
        usage_limit: None,
        times_used: 0,
        restaurant_id: None,
    })?;

    Ok(())
}
