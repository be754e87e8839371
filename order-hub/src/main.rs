use anyhow::Context;
use order_hub::services::{StaticLocationProvider, TracingSurface};
use order_hub::utils::logger::init_logger_with_file;
use order_hub::{Config, CustomerSession, OrderHub, ShopIdentity, ShopInfo};
use shared::order::{DeliveryLocation, OrderStatus, ProductRef};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (.env, config, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    std::fs::create_dir_all(config.log_dir())
        .with_context(|| format!("creating log dir {}", config.log_dir().display()))?;
    let log_dir = config.log_dir().to_string_lossy().into_owned();
    init_logger_with_file(Some(&config.log_level), Some(&log_dir));

    tracing::info!(work_dir = %config.work_dir, "🧺 Souk order hub starting...");

    // 2. Hub + background tasks
    let hub = OrderHub::open(
        config,
        Arc::new(StaticLocationProvider::granted(DeliveryLocation::new(
            24.8607, 67.0011,
        ))),
        Arc::new(TracingSurface),
    )
    .context("opening order hub")?;
    let tasks = hub.start_background_tasks();

    // 3. Demo walk-through: one customer, one shop
    let shop = ShopIdentity::new("loom-house", "Loom House");
    let customer = CustomerSession::new("ayesha", "Ayesha Khan");

    let mut listener = hub.watch_shop(&shop.shop_id);
    listener.wait_live().await;
    let mut tracker = hub.track_customer(&customer.customer_id);
    tracker.wait_live().await;

    let mut cart = hub.cart_for(&customer);
    if cart.is_empty() {
        cart.add_item(&ProductRef::new("kurta", "Kurta", 3500.0), "M", 2);
        cart.add_item(&ProductRef::new("scarf", "Scarf", 1200.0), "One Size", 1);
    }
    tracing::info!(total = cart.total(), count = cart.count(), "Cart ready");

    let order_id = hub
        .submission()
        .submit(&mut cart, Some(&customer), &ShopInfo::from(&shop), None)
        .await
        .context("submitting order")?;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
    ] {
        let order = hub
            .machine()
            .apply_transition(&order_id, status, &shop.actor())
            .await
            .with_context(|| format!("moving order to {status}"))?;
        tracing::info!(
            order_id = %order.order_id,
            status = %order.status,
            label = ?order.status.merchant_label(),
            "Shop advanced order"
        );
    }

    // 4. Run until Ctrl+C
    tracing::info!("Order hub running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!(status = ?tracker.status_of(&order_id), "Final customer view");
    listener.stop().await;
    tracker.stop().await;
    tasks.shutdown().await;
    Ok(())
}
