pub mod aspect;
pub mod behavior;
mod dump;
pub mod events;
pub mod graph;
pub mod node;
pub mod params;
pub mod signal;
pub mod types;

pub use aspect::{Aspect, AspectManager, LoggingAspect};
pub use behavior::{Element, ElementContext, FunctionElement, NoopElement};
pub use events::{BufferingEventSink, ElementEvent, EventEnvelope, EventSink, LoggingEventSink};
pub use graph::ElementGraph;
pub use node::ElementNode;
pub use params::{LocalParams, ParamManager};
pub use signal::{CondvarGate, WatchGate, YieldGate};
pub use types::{
    AspectKind, ElementId, ElementKind, ElementRelation, Phase, RunState,
    SECONDARY_THREAD_COMMON_ID,
};
