//! An order travelling through approval and delivery, coordinated by a saga.
//!
//! Run with: `cargo run --example order_fulfillment`
//!
//! Set `RUST_LOG=sequent=debug` to watch commits and saga routing.

#[path = "../tests/shop/mod.rs"]
mod shop;

use sequent::Saga as _;
use shop::{
    ApprovalCommand, DeliveryCommand, FulfillmentState, Order, OrderAction, OrderCommand,
    OrderFulfillmentSaga, ServiceType, Shop,
};
use tracing_subscriber::EnvFilter;

type DemoResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Hand new events to the saga and report what happened.
async fn deliver(shop: &mut Shop) -> DemoResult<Option<String>> {
    let mut saga_id = None;
    for result in shop.deliver().await {
        let processed = result?;
        println!(
            "  saga {} handled an event{}{}",
            processed.saga_id,
            if processed.started { " (started)" } else { "" },
            if processed.associations.is_empty() {
                String::new()
            } else {
                format!(
                    ", now also listening on {}",
                    processed
                        .associations
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        );
        saga_id = Some(processed.saga_id);
    }
    Ok(saga_id)
}

fn saga_state(shop: &Shop, saga_id: &str) -> DemoResult<FulfillmentState> {
    let raw = shop
        .sagas
        .saga_store()
        .saga(saga_id)
        .ok_or("saga was never saved")?;
    Ok(serde_json::from_str(raw.data.get())?)
}

#[tokio::main]
async fn main() -> DemoResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Order Fulfilment Example ===\n");
    let mut shop = Shop::new();

    println!("1. A customer starts a delivery order and submits it");
    shop.repository
        .process_command::<Order>(&OrderCommand::start(
            "order-42",
            ServiceType::Pickup,
            "margherita",
        ))
        .await?;
    shop.repository
        .process_command::<Order>(&OrderCommand::new(
            "order-42",
            OrderAction::Update {
                service_type: ServiceType::Delivery,
                description: "margherita, extra basil".to_string(),
            },
        ))
        .await?;
    shop.repository
        .process_command::<Order>(&OrderCommand::new("order-42", OrderAction::Submit))
        .await?;
    let saga_id = deliver(&mut shop).await?.ok_or("no saga started")?;

    let state = saga_state(&shop, &saga_id)?;
    let approval_id = state.approval_id.ok_or("approval was not requested")?;
    println!("   approval requested as {approval_id}\n");

    println!("2. The vendor approves");
    shop.repository
        .process_command::<shop::Approval>(&ApprovalCommand::receive(&approval_id))
        .await?;
    deliver(&mut shop).await?;
    let delivery_id = saga_state(&shop, &saga_id)?
        .delivery_id
        .ok_or("delivery was not requested")?;
    println!("   delivery requested as {delivery_id}\n");

    println!("3. The courier confirms");
    shop.repository
        .process_command::<shop::Delivery>(&DeliveryCommand::confirm(&delivery_id))
        .await?;
    deliver(&mut shop).await?;

    let order = shop.repository.load::<Order>("order-42").await?;
    let state = saga_state(&shop, &saga_id)?;
    println!(
        "\nOrder {} is {:?} after {} events; saga delivered = {}",
        order.id(),
        order.state().status,
        order.sequence(),
        state.delivered
    );
    println!(
        "{} events in the log, {} saga instance(s) of type {}",
        shop.store().all_events().len(),
        shop.sagas.saga_store().len(),
        OrderFulfillmentSaga::TYPE,
    );

    Ok(())
}
