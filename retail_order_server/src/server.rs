use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use retail_order_engine::{events::EventProducers, CheckoutApi, OrderFlowApi, OrderQueryApi, SqliteDatabase};

use crate::{
    config::{ServerConfig, ADMIN_API_KEY_HEADER, WEBHOOK_SIGNATURE_HEADER},
    errors::ServerError,
    middleware::{ApiKeyMiddlewareFactory, HmacMiddlewareFactory},
    routes::{
        cancel_order,
        checkout,
        health,
        mark_order_paid,
        order_by_id,
        order_stats,
        search_orders,
        unattributed_payments,
        update_order_status,
    },
    webhook_routes::payment_webhook,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let bind_host = config.host.clone();
    let bind_port = config.port;
    let srv = HttpServer::new(move || {
        // Hook subscribers would be registered here; the server itself runs with no hooks attached.
        let producers = EventProducers::default();
        let checkout_api = CheckoutApi::new(db.clone(), producers.clone());
        let flow_api =
            OrderFlowApi::new(db.clone(), producers).with_min_reference_run(config.min_reference_run);
        let query_api = OrderQueryApi::new(db.clone());
        // Behind a reverse proxy the peer address is the proxy; log the forwarded client address instead.
        let log_format = if config.use_x_forwarded_for {
            "%t (%D ms) %s %{X-Forwarded-For}i %{Host}i %U"
        } else {
            "%t (%D ms) %s %a %{Host}i %U"
        };
        let app = App::new()
            .wrap(Logger::new(log_format).log_target("ros::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(config.clone()));
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                WEBHOOK_SIGNATURE_HEADER,
                config.webhook_secret.clone(),
                config.webhook_hmac_checks,
            ))
            .route("/payment", web::post().to(payment_webhook::<SqliteDatabase>));
        let admin_scope = web::scope("/api")
            .wrap(ApiKeyMiddlewareFactory::new(ADMIN_API_KEY_HEADER, config.admin_api_key.clone()))
            .route("/orders", web::get().to(search_orders::<SqliteDatabase>))
            .route("/orders/stats", web::get().to(order_stats::<SqliteDatabase>))
            .route("/orders/{id}", web::get().to(order_by_id::<SqliteDatabase>))
            .route("/orders/{id}/status", web::post().to(update_order_status::<SqliteDatabase>))
            .route("/orders/{id}/mark_paid", web::post().to(mark_order_paid::<SqliteDatabase>))
            .route("/payments/unattributed", web::get().to(unattributed_payments::<SqliteDatabase>));
        app.service(health)
            .route("/checkout", web::post().to(checkout::<SqliteDatabase>))
            .route("/orders/{id}/cancel", web::post().to(cancel_order::<SqliteDatabase>))
            .service(webhook_scope)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_host.as_str(), bind_port))?
    .run();
    Ok(srv)
}
