//! Arena owning every element of one task graph
//!
//! Relations are stored as [`ElementId`] handles, so dropping the graph
//! releases all elements together with their aspects and local parameters.

use super::behavior::Element;
use super::dump::{write_edge, write_label};
use super::events::EventSink;
use super::node::ElementNode;
use super::params::ParamManager;
use super::types::{ElementId, ElementKind, ElementRelation, Phase, RunState};
use crate::core::errors::{ElementError, Result, Status};
use crate::pool::ThreadPool;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct ElementGraph {
    elements: Vec<ElementNode>,
    finalized: bool,
}

impl ElementGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_building(&self, operation: &str) -> Result<()> {
        if self.finalized {
            return Err(ElementError::configuration(format!(
                "cannot {} after the graph is finalized",
                operation
            )));
        }
        Ok(())
    }

    fn insert(&mut self, kind: ElementKind, behavior: Box<dyn Element>) -> Result<ElementId> {
        self.ensure_building("add elements")?;
        let id = ElementId(self.elements.len());
        self.elements.push(ElementNode::new(id, kind, behavior));
        Ok(id)
    }

    pub fn add_element(&mut self, behavior: impl Element + 'static) -> Result<ElementId> {
        self.insert(ElementKind::Element, Box::new(behavior))
    }

    /// Add a composite element and attach `members` to it
    pub fn add_group(
        &mut self,
        behavior: impl Element + 'static,
        members: &[ElementId],
    ) -> Result<ElementId> {
        self.validate_ids(members)?;
        let group = self.insert(ElementKind::Group, Box::new(behavior))?;
        self.add_to_group(group, members)?;
        Ok(group)
    }

    pub fn add_to_group(&mut self, group: ElementId, members: &[ElementId]) -> Result<()> {
        self.ensure_building("change group membership")?;
        if !self.get(group)?.is_group() {
            return Err(ElementError::precondition("target is not a group")
                .with_context("element", group.to_string()));
        }
        self.validate_ids(members)?;
        for &member in members {
            if member == group {
                return Err(ElementError::precondition("a group cannot contain itself")
                    .with_context("element", group.to_string()));
            }
        }
        for &member in members {
            self.elements[member.index()].set_belong(group)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.iter().map(|node| node.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementNode> {
        self.elements.iter()
    }

    pub fn node(&self, id: ElementId) -> Option<&ElementNode> {
        self.elements.get(id.index())
    }

    /// Like [`node`](Self::node) but an unknown handle is a precondition error
    pub fn get(&self, id: ElementId) -> Result<&ElementNode> {
        self.elements.get(id.index()).ok_or_else(|| unknown(id))
    }

    pub fn get_mut(&mut self, id: ElementId) -> Result<&mut ElementNode> {
        self.elements.get_mut(id.index()).ok_or_else(|| unknown(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|node| node.name() == name)
            .map(|node| node.id())
    }

    fn validate_ids(&self, ids: &[ElementId]) -> Result<()> {
        for &id in ids {
            self.get(id)?;
        }
        Ok(())
    }

    // ---- dependency tracking ----

    /// Register `depends` as predecessors of `id`.
    ///
    /// Self-edges are ignored and repeated edges collapse, after which the
    /// readiness counter equals the size of the predecessor set.
    pub fn add_dependencies(&mut self, id: ElementId, depends: &[ElementId]) -> Result<()> {
        self.ensure_building("add dependencies")?;
        self.check_links(id, depends)?;

        for &dep in depends {
            if dep == id {
                continue;
            }
            self.elements[dep.index()].run_before.insert(id);
            self.elements[id.index()].dependence.insert(dep);
        }
        self.elements[id.index()].recount_dependencies();
        Ok(())
    }

    fn check_links(&self, id: ElementId, depends: &[ElementId]) -> Result<()> {
        self.get(id)?.ensure_linkable()?;
        for &dep in depends {
            self.get(dep)
                .map_err(|e| e.with_context("dependent", id.to_string()))?
                .ensure_linkable()?;
        }
        Ok(())
    }

    /// One-time setup done by the graph builder for every element.
    ///
    /// Every handle is checked before anything is applied, so a rejected call
    /// leaves the element untouched and can be retried.
    pub fn set_element_info(
        &mut self,
        id: ElementId,
        depends: &[ElementId],
        name: &str,
        loop_count: usize,
        params: Option<Arc<ParamManager>>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<()> {
        self.ensure_building("set element info")?;
        self.check_links(id, depends)?;
        let node = self.get_mut(id)?;
        node.bind_managers(params, events)?;
        node.set_name(name)?.set_loop(loop_count)?;
        self.add_dependencies(id, depends)
    }

    /// Bind every element to the same worker pool
    pub fn bind_thread_pool(&mut self, pool: Arc<dyn ThreadPool>) -> Result<()> {
        self.ensure_building("bind a thread pool")?;
        for node in &mut self.elements {
            node.set_thread_pool(Arc::clone(&pool))?;
        }
        Ok(())
    }

    /// Freeze configuration and prime readiness counters.
    ///
    /// Fails when the dependency edges contain a cycle.
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_building("finalize")?;

        let mut dag: DiGraph<ElementId, ()> = DiGraph::with_capacity(self.len(), 0);
        let indices: Vec<NodeIndex> = self.ids().map(|id| dag.add_node(id)).collect();
        for node in &self.elements {
            for successor in node.run_before() {
                dag.add_edge(indices[node.id().index()], indices[successor.index()], ());
            }
        }
        if let Err(cycle) = toposort(&dag, None) {
            let culprit = dag[cycle.node_id()];
            return Err(ElementError::Configuration {
                message: "dependency edges contain a cycle".to_string(),
                field: Some("dependence".to_string()),
                element: Some(self.elements[culprit.index()].name().to_string()),
            });
        }

        for node in &mut self.elements {
            node.finalize();
            node.before_run();
        }
        self.finalized = true;
        info!("Finalized element graph with {} elements", self.len());
        Ok(())
    }

    pub fn before_run(&self, id: ElementId) -> Result<()> {
        self.get(id)?.before_run();
        Ok(())
    }

    /// Release every successor by one and mark `id` done.
    ///
    /// Returns the successors this call made runnable.
    pub fn after_run(&self, id: ElementId) -> Result<Vec<ElementId>> {
        let node = self.get(id)?;
        let mut unblocked = Vec::new();
        for &successor in node.run_before() {
            let target = &self.elements[successor.index()];
            if target.release_one_dependency() == 0 && !target.is_done() {
                unblocked.push(successor);
            }
        }
        node.mark_done();
        debug!(element = %node.name(), "Completed, unblocked {} successors", unblocked.len());
        Ok(unblocked)
    }

    pub fn is_runnable(&self, id: ElementId) -> bool {
        self.node(id).map(|node| node.is_runnable()).unwrap_or(false)
    }

    pub fn execute(&self, id: ElementId, phase: Phase) -> Status {
        self.get(id)?.execute(phase)
    }

    /// Broadcast a run signal to every element
    pub fn set_run_state(&self, state: RunState) {
        for node in &self.elements {
            node.set_run_state(state);
        }
    }

    // ---- relations & export ----

    pub fn build_relation(&self, id: ElementId) -> Result<ElementRelation> {
        Ok(self.get(id)?.build_relation())
    }

    /// Label for `id` followed by one edge line per successor
    pub fn dump_element<W: Write>(&self, id: ElementId, out: &mut W) -> fmt::Result {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        write_label(out, node)?;
        self.dump_edges(node, out)
    }

    fn dump_edges<W: Write>(&self, node: &ElementNode, out: &mut W) -> fmt::Result {
        for successor in node.run_before() {
            write_edge(out, node, &self.elements[successor.index()])?;
        }
        Ok(())
    }

    /// Whole graph as a `digraph`, one `cluster_p<id>` subgraph per group
    pub fn dump<W: Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str("digraph CGraph {\ncompound=true;\n")?;
        // Declarations first so edges never pull members out of their cluster
        for node in self.elements.iter().filter(|node| node.belong().is_none()) {
            self.dump_scope(node, out)?;
        }
        for node in &self.elements {
            self.dump_edges(node, out)?;
        }
        out.write_str("}\n")
    }

    fn dump_scope<W: Write>(&self, node: &ElementNode, out: &mut W) -> fmt::Result {
        if !node.is_group() {
            return write_label(out, node);
        }

        writeln!(out, "subgraph cluster_{} {{", node.id())?;
        write_label(out, node)?;
        let members = self
            .elements
            .iter()
            .filter(|member| member.belong() == Some(node.id()));
        for member in members {
            self.dump_scope(member, out)?;
        }
        out.write_str("}\n")
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        // Writing into a String cannot fail
        let _ = self.dump(&mut dot);
        dot
    }
}

fn unknown(id: ElementId) -> ElementError {
    ElementError::precondition("unknown element handle").with_context("element", id.to_string())
}
