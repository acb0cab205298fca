mod base;

pub use base::{
    ErrorDetail, EventBus, ExecutionEvent, Fanout, NoopBroadcaster, ProgressBroadcaster,
    TracingBroadcaster,
};
