// tests/common/mod.rs
#![allow(dead_code)] // Allow unused helpers in this common test module

use chrono::Utc;
use uuid::Uuid;

use tienda_norte::gateway::mock::MockGateway;
use tienda_norte::gateway::{GatewayOrderRef, GatewayPayer, GatewayPayment};
use tienda_norte::models::{Product, Variant};
use tienda_norte::services::checkout::{CartLine, CreateOrderInput, ShippingInput, ShippingMethod};
use tienda_norte::services::Actor;
use tienda_norte::storage::memory::MemoryStorage;

pub fn setup_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

// --- Actors ---

pub fn customer() -> Actor {
  Actor {
    user_id: Some(Uuid::new_v4()),
    email: Some("cliente@example.com".to_string()),
    is_admin: false,
  }
}

pub fn admin() -> Actor {
  Actor {
    user_id: Some(Uuid::new_v4()),
    email: Some("admin@example.com".to_string()),
    is_admin: true,
  }
}

// --- Catalog seeding ---

pub fn product(name: &str, base_price_cents: i64) -> Product {
  let now = Utc::now();
  Product {
    id: Uuid::new_v4(),
    name: name.to_string(),
    description: None,
    base_price_cents,
    active: true,
    created_at: now,
    updated_at: now,
  }
}

pub fn variant(product_id: Uuid, size: &str, color: &str, stock: i32) -> Variant {
  Variant {
    id: Uuid::new_v4(),
    product_id,
    size: size.to_string(),
    color: color.to_string(),
    stock,
    surcharge_cents: 0,
    active: true,
  }
}

/// Seeds one product with one variant holding all the stock; returns
/// (storage, product, variant).
pub async fn storage_with_product(
  name: &str,
  base_price_cents: i64,
  stock: i32,
) -> (MemoryStorage, Product, Variant) {
  let storage = MemoryStorage::new();
  let p = product(name, base_price_cents);
  let v = variant(p.id, "M", "blue", stock);
  storage.seed_product(p.clone()).await;
  storage.seed_variant(v.clone()).await;
  (storage, p, v)
}

// --- Cart inputs ---

pub fn line(product_id: Uuid, quantity: i32, unit_price_cents: i64) -> CartLine {
  CartLine {
    product_id,
    variant_id: None,
    quantity,
    unit_price_cents,
  }
}

pub fn variant_line(product_id: Uuid, variant_id: Uuid, quantity: i32, unit_price_cents: i64) -> CartLine {
  CartLine {
    product_id,
    variant_id: Some(variant_id),
    quantity,
    unit_price_cents,
  }
}

pub fn order_input(items: Vec<CartLine>, shipping_cost_cents: i64) -> CreateOrderInput {
  CreateOrderInput {
    items,
    contact: None,
    shipping: Some(ShippingInput {
      method: ShippingMethod::Pickup,
      cost_cents: shipping_cost_cents,
      address: None,
    }),
    notes: None,
  }
}

// --- Gateway payments ---

pub fn gateway_payment(id: i64, status: &str, external_reference: Option<String>, amount: f64) -> GatewayPayment {
  GatewayPayment {
    id,
    status: status.to_string(),
    status_detail: Some(format!("{}_detail", status)),
    external_reference,
    transaction_amount: amount,
    payment_method_id: Some("visa".to_string()),
    payment_type_id: Some("credit_card".to_string()),
    installments: Some(3),
    payer: Some(GatewayPayer {
      email: Some("payer@example.com".to_string()),
    }),
    order: Some(GatewayOrderRef { id: Some(5550001) }),
  }
}

pub fn mock_gateway() -> MockGateway {
  MockGateway::new()
}
