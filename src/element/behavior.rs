//! User-facing element behaviour

use super::events::{envelope, ElementEvent};
use super::node::ElementNode;
use super::params::{LocalParams, ParamManager};
use super::types::{ElementId, RunState};
use crate::core::errors::{ElementError, Status};
use std::sync::Arc;

/// Work performed by an element.
///
/// Only [`run`](Element::run) is required. The execution state machine wraps
/// every call with aspect hooks and catches panics, so implementations can
/// simply return a failure or panic without bringing down the worker.
pub trait Element: Send {
    fn init(&mut self, _ctx: &ElementContext<'_>) -> Status {
        Ok(())
    }

    fn run(&mut self, ctx: &ElementContext<'_>) -> Status;

    fn destroy(&mut self, _ctx: &ElementContext<'_>) -> Status {
        Ok(())
    }

    /// Repeat the current RUN attempt while this returns true.
    /// Consulted only after a successful `run`.
    fn is_hold(&mut self, _ctx: &ElementContext<'_>) -> bool {
        false
    }

    /// Whether this element is selected among siblings of a multi-branch group
    fn is_match(&mut self, _ctx: &ElementContext<'_>) -> bool {
        false
    }

    /// Whether the element may run on a serial schedule
    fn is_serializable(&self) -> bool {
        true
    }

    /// Build the status reported when a phase panics
    fn crashed(&mut self, message: String) -> ElementError {
        ElementError::crashed(message)
    }
}

/// Closure-backed element for simple run logic
pub struct FunctionElement<F> {
    func: F,
}

impl<F> FunctionElement<F>
where
    F: FnMut(&ElementContext<'_>) -> Status + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Element for FunctionElement<F>
where
    F: FnMut(&ElementContext<'_>) -> Status + Send,
{
    fn run(&mut self, ctx: &ElementContext<'_>) -> Status {
        (self.func)(ctx)
    }
}

/// Element that does nothing; handy for groups and join points
pub struct NoopElement;

impl Element for NoopElement {
    fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
        Ok(())
    }
}

/// View of the owning element handed to user code during a phase
pub struct ElementContext<'a> {
    node: &'a ElementNode,
}

impl<'a> ElementContext<'a> {
    pub(crate) fn new(node: &'a ElementNode) -> Self {
        Self { node }
    }

    pub fn id(&self) -> ElementId {
        self.node.id()
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn loop_count(&self) -> usize {
        self.node.loop_count()
    }

    pub fn level(&self) -> i32 {
        self.node.level()
    }

    pub fn binding_index(&self) -> Option<usize> {
        self.node.binding_index()
    }

    pub fn run_state(&self) -> RunState {
        self.node.run_state()
    }

    /// Logical slot of the worker running this call
    pub fn thread_index(&self) -> isize {
        self.node.thread_index()
    }

    /// Graph-wide parameters, if the builder supplied them
    pub fn params(&self) -> Option<&Arc<ParamManager>> {
        self.node.param_manager()
    }

    pub fn local(&self) -> &LocalParams {
        self.node.local_params()
    }

    /// Publish an event; a no-op when no sink is bound
    pub fn emit(&self, key: impl Into<String>, payload: serde_json::Value) {
        if let Some(sink) = self.node.event_sink() {
            sink.emit(&envelope(ElementEvent {
                key: key.into(),
                element: self.node.name().to_string(),
                payload,
            }));
        }
    }
}
