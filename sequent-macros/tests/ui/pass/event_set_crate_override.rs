extern crate sequent as es;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pinged {
    pub at: u64,
}

impl es::event::EventData for Pinged {
    const EVENT_TYPE: &'static str = "Pinged";
    const VERSION: u32 = 1;
}

#[derive(Debug, es::EventSet)]
#[event_set(crate = "es")]
pub enum HeartbeatEvent {
    Pinged(Pinged),
}

fn main() {
    assert_eq!(<HeartbeatEvent as es::event::EventSet>::EVENT_TYPES, ["Pinged"]);
}
