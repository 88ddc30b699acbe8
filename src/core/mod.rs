//! Runtime primitives: run context, epochs, events and injectable providers.

pub mod epoch;
pub mod event_bus;
pub mod execution_context;
pub mod runtime_context;
pub mod value_path;

pub use epoch::{EpochCounter, RunToken};
pub use event_bus::{create_event_channel, ConsoleEvent, EventReceiver, EventSender};
pub use execution_context::{ContextWrite, ExecutionContext};
pub use runtime_context::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
pub use value_path::lookup_path;
