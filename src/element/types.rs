//! Core types shared by elements, the graph arena and the exporter

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Thread index reported when the caller is not a pool worker,
/// or when no pool is bound to the element
pub const SECONDARY_THREAD_COMMON_ID: isize = -1;

/// Stable handle of an element inside its [`ElementGraph`](super::ElementGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Classification of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Plain unit of work
    Element,
    /// Composite element holding a nested subgraph
    Group,
}

impl ElementKind {
    pub fn is_group(self) -> bool {
        matches!(self, ElementKind::Group)
    }
}

/// Cross-thread run signal
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Normal = 0,
    Yield = 1,
    Cancel = 2,
}

impl RunState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RunState::Normal),
            1 => Some(RunState::Yield),
            2 => Some(RunState::Cancel),
            _ => None,
        }
    }
}

/// Lifecycle phase driven by the execution state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Init,
    Run,
    Destroy,
}

impl Phase {
    /// Hook kinds bracketing this phase
    pub fn hooks(self) -> (AspectKind, AspectKind) {
        match self {
            Phase::Init => (AspectKind::BeginInit, AspectKind::FinishInit),
            Phase::Run => (AspectKind::BeginRun, AspectKind::FinishRun),
            Phase::Destroy => (AspectKind::BeginDestroy, AspectKind::FinishDestroy),
        }
    }
}

/// Instrumentation points around each phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKind {
    BeginInit,
    FinishInit,
    BeginRun,
    FinishRun,
    BeginDestroy,
    FinishDestroy,
}

impl AspectKind {
    pub fn is_begin(self) -> bool {
        matches!(
            self,
            AspectKind::BeginInit | AspectKind::BeginRun | AspectKind::BeginDestroy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectKind::BeginInit => "begin_init",
            AspectKind::FinishInit => "finish_init",
            AspectKind::BeginRun => "begin_run",
            AspectKind::FinishRun => "finish_run",
            AspectKind::BeginDestroy => "begin_destroy",
            AspectKind::FinishDestroy => "finish_destroy",
        }
    }
}

/// Read-only snapshot of an element's position in the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRelation {
    pub predecessors: BTreeSet<ElementId>,
    pub successors: BTreeSet<ElementId>,
    pub belong: Option<ElementId>,
}
