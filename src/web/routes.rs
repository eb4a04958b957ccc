// src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{order_handlers, payment_handlers, product_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Configures every service route. Called from `main.rs` (and from the
/// HTTP-level tests) when building the Actix app.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          // Fixed segment before the `{order_id}` routes so it is not
          // swallowed by the path parameter.
          .route("/stats", web::get().to(order_handlers::order_stats_handler))
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}", web::delete().to(order_handlers::deactivate_order_handler))
          .route("/{order_id}/state", web::post().to(order_handlers::change_state_handler))
          .route("/{order_id}/history", web::get().to(order_handlers::order_history_handler)),
      )
      .service(
        web::scope("/products")
          .route("", web::get().to(product_handlers::list_products_handler))
          .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
          .route(
            "/{product_id}/variants/{variant_id}/stock/increase",
            web::post().to(product_handlers::increase_stock_handler),
          )
          .route(
            "/{product_id}/variants/{variant_id}/stock/decrease",
            web::post().to(product_handlers::decrease_stock_handler),
          ),
      )
      .service(
        web::scope("/payments")
          .route("", web::get().to(payment_handlers::list_payments_handler))
          .route("/preference", web::post().to(payment_handlers::create_preference_handler))
          .route("/webhook", web::post().to(payment_handlers::webhook_handler))
          .route("/confirm", web::post().to(payment_handlers::confirm_handler))
          .route("/{payment_id}/state", web::post().to(payment_handlers::set_state_handler)),
      ),
  );
}
