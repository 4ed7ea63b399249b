use sequent::EventSet;

mod payloads {
    use serde::{Deserialize, Serialize};
    use sequent::event::EventData;

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct Opened;

    impl EventData for Opened {
        const EVENT_TYPE: &'static str = "Opened";
        const VERSION: u32 = 1;
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct Closed {
        pub reason: String,
    }

    impl EventData for Closed {
        const EVENT_TYPE: &'static str = "Closed";
        const VERSION: u32 = 1;
    }
}

#[derive(Debug, EventSet)]
enum TicketEvent {
    Opened(payloads::Opened),
    Closed(payloads::Closed),
}

fn main() {
    let _: TicketEvent = payloads::Opened.into();
    let _: TicketEvent = payloads::Closed::default().into();
}
