//! Small counter domain shared by unit tests across the crate.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::{
    aggregate::{Aggregate, AggregateContext, ApplyError, Command},
    event::{Event, EventData, EventSet},
    registry::Registry,
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Add {
    pub amount: i64,
}

impl EventData for Add {
    const EVENT_TYPE: &'static str = "CounterAdded";
    const VERSION: u32 = 1;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reset;

impl EventData for Reset {
    const EVENT_TYPE: &'static str = "CounterReset";
    const VERSION: u32 = 1;
}

/// Part of the event set, but [`Counter`] does not handle it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frozen;

impl EventData for Frozen {
    const EVENT_TYPE: &'static str = "CounterFrozen";
    const VERSION: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEvent {
    Added(Add),
    Reset(Reset),
    Frozen(Frozen),
}

impl From<Add> for CounterEvent {
    fn from(e: Add) -> Self {
        Self::Added(e)
    }
}

impl From<Reset> for CounterEvent {
    fn from(e: Reset) -> Self {
        Self::Reset(e)
    }
}

impl From<Frozen> for CounterEvent {
    fn from(e: Frozen) -> Self {
        Self::Frozen(e)
    }
}

impl EventSet for CounterEvent {
    const EVENT_TYPES: &'static [&'static str] =
        &[Add::EVENT_TYPE, Reset::EVENT_TYPE, Frozen::EVENT_TYPE];

    fn event_type(&self) -> &'static str {
        match self {
            Self::Added(_) => Add::EVENT_TYPE,
            Self::Reset(_) => Reset::EVENT_TYPE,
            Self::Frozen(_) => Frozen::EVENT_TYPE,
        }
    }

    fn version(&self) -> u32 {
        match self {
            Self::Added(_) => Add::VERSION,
            Self::Reset(_) => Reset::VERSION,
            Self::Frozen(_) => Frozen::VERSION,
        }
    }

    fn encode(&self) -> Result<Box<RawValue>, serde_json::Error> {
        match self {
            Self::Added(e) => serde_json::value::to_raw_value(e),
            Self::Reset(e) => serde_json::value::to_raw_value(e),
            Self::Frozen(e) => serde_json::value::to_raw_value(e),
        }
    }

    fn register_all(registry: &mut Registry<Self>) {
        registry
            .register::<Add>()
            .register::<Reset>()
            .register::<Frozen>();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    Add(i64),
    AddMany(Vec<i64>),
    /// Adds the current sequence number.
    AddSequence,
    Reset,
    Freeze,
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCommand {
    pub id: String,
    pub action: CounterAction,
}

impl CounterCommand {
    pub fn new(id: impl Into<String>, action: CounterAction) -> Self {
        Self {
            id: id.into(),
            action,
        }
    }
}

impl Command for CounterCommand {
    fn aggregate_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("amount must be positive, got {0}")]
    NonPositive(i64),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counter {
    pub value: i64,
}

impl Aggregate for Counter {
    type Command = CounterCommand;
    type Error = CounterError;
    type Event = CounterEvent;

    const KIND: &'static str = "counter";

    fn handle(
        &self,
        context: &AggregateContext<'_>,
        command: &CounterCommand,
    ) -> Result<Vec<CounterEvent>, CounterError> {
        let add = |amount: i64| {
            if amount <= 0 {
                Err(CounterError::NonPositive(amount))
            } else {
                Ok(CounterEvent::from(Add { amount }))
            }
        };
        match &command.action {
            CounterAction::Add(amount) => Ok(vec![add(*amount)?]),
            CounterAction::AddMany(amounts) => amounts.iter().map(|a| add(*a)).collect(),
            CounterAction::AddSequence => Ok(vec![
                Add {
                    amount: i64::try_from(context.sequence).unwrap_or(i64::MAX),
                }
                .into(),
            ]),
            CounterAction::Reset => Ok(vec![Reset.into()]),
            CounterAction::Freeze => Ok(vec![Frozen.into()]),
            CounterAction::Noop => Ok(vec![]),
        }
    }

    fn apply(&mut self, event: &Event<CounterEvent>) -> Result<(), ApplyError> {
        match &event.data {
            CounterEvent::Added(e) => self.value += e.amount,
            CounterEvent::Reset(_) => self.value = 0,
            CounterEvent::Frozen(_) => return Err(ApplyError::unsupported::<Self>(event)),
        }
        Ok(())
    }
}
