use serde::{Deserialize, Serialize};
use sequent::{EventSet, event::EventData, event::EventSet as _, registry::Registry};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FundsDeposited {
    pub amount: i64,
}

impl EventData for FundsDeposited {
    const EVENT_TYPE: &'static str = "FundsDeposited";
    const VERSION: u32 = 1;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    pub amount: i64,
}

impl EventData for FundsWithdrawn {
    const EVENT_TYPE: &'static str = "FundsWithdrawn";
    const VERSION: u32 = 2;
}

#[derive(Clone, Debug, EventSet)]
pub enum AccountEvent {
    Deposited(FundsDeposited),
    Withdrawn(FundsWithdrawn),
}

fn main() {
    assert_eq!(
        AccountEvent::EVENT_TYPES,
        ["FundsDeposited", "FundsWithdrawn"]
    );

    let event = AccountEvent::from(FundsWithdrawn { amount: 3 });
    assert_eq!(event.event_type(), "FundsWithdrawn");
    assert_eq!(event.version(), 2);
    assert_eq!(event.encode().unwrap().get(), r#"{"amount":3}"#);

    let registry = Registry::<AccountEvent>::for_set();
    assert_eq!(registry.len(), 2);
}
