//! Elements of a dependency-driven task graph
//!
//! An element is one node of a graph that runs on a worker pool. It tracks
//! how many predecessors are still outstanding, walks an INIT / RUN / DESTROY
//! state machine wrapped by aspect hooks, contains panics from user code, and
//! can be paused or cancelled between loop iterations.

pub mod core;
pub mod element;
pub mod pool;
pub mod runner;

pub use crate::core::config::{ElementConfig, OnFailure, PoolConfig, RunnerConfig};
pub use crate::core::errors::{ElementError, Result, Status};
pub use element::{
    Aspect, AspectKind, BufferingEventSink, CondvarGate, Element, ElementContext, ElementGraph,
    ElementId, ElementKind, ElementNode, ElementRelation, EventSink, FunctionElement,
    LoggingAspect, LoggingEventSink, NoopElement, ParamManager, Phase, RunState, WatchGate,
    YieldGate, SECONDARY_THREAD_COMMON_ID,
};
pub use pool::{ThreadPool, WorkerPool};
pub use runner::{ExecutionOutcome, ExecutionReport, GraphRunner};
