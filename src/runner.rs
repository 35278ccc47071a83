//! Reference driver for a finalized element graph
//!
//! Runs INIT, one activation of RUN, and DESTROY. Activation follows the
//! readiness protocol: every element is reset with `before_run`, runnable
//! elements are dispatched to the pool, and each worker calls `after_run`
//! itself so successor counters are released concurrently.

use crate::core::config::{OnFailure, RunnerConfig};
use crate::core::errors::{ElementError, Result, Status};
use crate::element::{ElementGraph, ElementId, Phase, RunState};
use crate::pool::ThreadPool;
use crossbeam::channel::unbounded;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Result of running one element
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub element: ElementId,
    pub name: String,
    pub success: bool,
    pub crashed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Summary of one activation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub outcomes: Vec<ExecutionOutcome>,
    /// Elements never dispatched because a predecessor failed or the run stopped
    pub skipped: Vec<ElementId>,
    pub success: bool,
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn outcome(&self, element: ElementId) -> Option<&ExecutionOutcome> {
        self.outcomes.iter().find(|outcome| outcome.element == element)
    }
}

struct Completion {
    element: ElementId,
    status: Status,
    unblocked: Vec<ElementId>,
    elapsed: Duration,
}

pub struct GraphRunner {
    graph: Arc<ElementGraph>,
    pool: Arc<dyn ThreadPool>,
    config: RunnerConfig,
}

impl GraphRunner {
    pub fn new(graph: ElementGraph, pool: Arc<dyn ThreadPool>, config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        if !graph.is_finalized() {
            return Err(ElementError::configuration(
                "graph must be finalized before it can run",
            ));
        }
        Ok(Self {
            graph: Arc::new(graph),
            pool,
            config,
        })
    }

    pub fn graph(&self) -> &Arc<ElementGraph> {
        &self.graph
    }

    /// Run INIT on every element in handle order, stopping at the first failure
    #[instrument(skip(self))]
    pub fn init(&self) -> Result<()> {
        self.run_phase_serially(Phase::Init)
    }

    /// Run DESTROY on every element in handle order, stopping at the first failure
    #[instrument(skip(self))]
    pub fn destroy(&self) -> Result<()> {
        self.run_phase_serially(Phase::Destroy)
    }

    fn run_phase_serially(&self, phase: Phase) -> Result<()> {
        for id in self.graph.ids() {
            if let Err(e) = self.graph.execute(id, phase) {
                error!("{:?} failed for element {}: {}", phase, id, e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Ask every element to park after its current `run` call
    pub fn yield_all(&self) {
        self.graph.set_run_state(RunState::Yield);
    }

    pub fn resume_all(&self) {
        self.graph.set_run_state(RunState::Normal);
    }

    /// Stop further loop iterations; in-flight `run` calls complete
    pub fn cancel_all(&self) {
        self.graph.set_run_state(RunState::Cancel);
    }

    /// One activation of the whole graph
    #[instrument(skip(self))]
    pub fn run(&self) -> ExecutionReport {
        let mut outcomes = Vec::new();
        let mut overall_success = true;
        let mut dispatched = HashSet::new();
        let mut stopped = false;
        let mut failure: Option<String> = None;

        for id in self.graph.ids() {
            // ids() only yields valid handles
            let _ = self.graph.before_run(id);
        }
        let mut ready: Vec<ElementId> = self
            .graph
            .ids()
            .filter(|&id| self.graph.is_runnable(id))
            .collect();

        let (tx, rx) = unbounded::<Completion>();
        let mut active_tasks = 0usize;

        loop {
            if !stopped {
                for id in ready.drain(..) {
                    if !dispatched.insert(id) {
                        continue;
                    }
                    let graph = Arc::clone(&self.graph);
                    let tx = tx.clone();
                    let job = Box::new(move || {
                        let started = Instant::now();
                        let status = graph.execute(id, Phase::Run);
                        let unblocked = match status {
                            Ok(()) => graph.after_run(id).unwrap_or_default(),
                            Err(_) => Vec::new(),
                        };
                        // The pool may be owned through the graph; release it before reporting
                        drop(graph);
                        let _ = tx.send(Completion {
                            element: id,
                            status,
                            unblocked,
                            elapsed: started.elapsed(),
                        });
                    });

                    match self.pool.execute(job) {
                        Ok(()) => {
                            active_tasks += 1;
                            debug!("Launching element {} (active tasks: {})", id, active_tasks);
                        }
                        Err(e) => {
                            error!("Failed to dispatch element {}: {}", id, e);
                            dispatched.remove(&id);
                            overall_success = false;
                            failure = Some(e.to_string());
                            stopped = true;
                            break;
                        }
                    }
                }
            }

            if active_tasks == 0 {
                info!("No active elements and nothing ready - activation complete");
                break;
            }

            let completion = match rx.recv() {
                Ok(completion) => completion,
                Err(_) => break,
            };
            active_tasks -= 1;

            let name = self
                .graph
                .node(completion.element)
                .map(|node| node.name().to_string())
                .unwrap_or_default();
            let outcome = ExecutionOutcome {
                element: completion.element,
                name,
                success: completion.status.is_ok(),
                crashed: matches!(&completion.status, Err(e) if e.is_crash()),
                error: completion.status.as_ref().err().map(|e| e.to_string()),
                duration_ms: completion.elapsed.as_millis() as u64,
            };

            match &completion.status {
                Ok(()) => ready.extend(completion.unblocked),
                Err(e) => {
                    warn!("Element {} failed: {}", outcome.name, e);
                    overall_success = false;
                    if self.config.on_failure == OnFailure::Stop {
                        stopped = true;
                        failure.get_or_insert_with(|| e.to_string());
                    }
                }
            }
            outcomes.push(outcome);
        }

        let skipped: Vec<ElementId> = self
            .graph
            .ids()
            .filter(|id| !dispatched.contains(id))
            .collect();
        if !skipped.is_empty() {
            overall_success = false;
        }

        ExecutionReport {
            outcomes,
            skipped,
            success: overall_success,
            error: failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PoolConfig;
    use crate::element::FunctionElement;
    use crate::pool::WorkerPool;
    use parking_lot::Mutex;

    fn pool() -> Arc<dyn ThreadPool> {
        Arc::new(WorkerPool::new(&PoolConfig::default()).unwrap())
    }

    fn recording(
        graph: &mut ElementGraph,
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
        depends: &[ElementId],
    ) -> ElementId {
        let log = Arc::clone(log);
        let label = name.to_string();
        let id = graph
            .add_element(FunctionElement::new(move |_ctx| {
                log.lock().push(label.clone());
                Ok(())
            }))
            .unwrap();
        graph.set_element_info(id, depends, name, 1, None, None).unwrap();
        id
    }

    fn failing(graph: &mut ElementGraph, name: &str) -> ElementId {
        let id = graph
            .add_element(FunctionElement::new(|_ctx| Err(ElementError::failed("a", "boom"))))
            .unwrap();
        graph.set_element_info(id, &[], name, 1, None, None).unwrap();
        id
    }

    #[test]
    fn test_diamond_runs_in_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ElementGraph::new();
        let a = recording(&mut graph, &log, "a", &[]);
        let b = recording(&mut graph, &log, "b", &[a]);
        let c = recording(&mut graph, &log, "c", &[a]);
        recording(&mut graph, &log, "d", &[b, c]);
        graph.finalize().unwrap();

        let runner = GraphRunner::new(graph, pool(), RunnerConfig::default()).unwrap();
        runner.init().unwrap();
        let report = runner.run();
        runner.destroy().unwrap();

        assert!(report.success);
        assert!(report.skipped.is_empty());
        assert_eq!(report.outcomes.len(), 4);
        let order = log.lock().clone();
        assert_eq!(order.first().map(String::as_str), Some("a"));
        assert_eq!(order.last().map(String::as_str), Some("d"));
    }

    #[test]
    fn test_graph_can_run_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ElementGraph::new();
        let a = recording(&mut graph, &log, "a", &[]);
        recording(&mut graph, &log, "b", &[a]);
        graph.finalize().unwrap();

        let runner = GraphRunner::new(graph, pool(), RunnerConfig::default()).unwrap();
        assert!(runner.run().success);
        assert!(runner.run().success);
        assert_eq!(*log.lock(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_stop_on_failure_skips_successors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ElementGraph::new();
        let a = failing(&mut graph, "a");
        let b = recording(&mut graph, &log, "b", &[a]);
        graph.finalize().unwrap();

        let runner = GraphRunner::new(graph, pool(), RunnerConfig::default()).unwrap();
        let report = runner.run();

        assert!(!report.success);
        assert_eq!(report.skipped, vec![b]);
        assert!(report.error.as_deref().unwrap_or_default().contains("boom"));
        assert!(!report.outcome(a).unwrap().success);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_continue_runs_independent_branches() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = ElementGraph::new();
        let a = failing(&mut graph, "a");
        let b = recording(&mut graph, &log, "b", &[a]);
        let c = recording(&mut graph, &log, "c", &[]);
        recording(&mut graph, &log, "d", &[c]);
        graph.finalize().unwrap();

        let config = RunnerConfig {
            on_failure: OnFailure::Continue,
            ..RunnerConfig::default()
        };
        let runner = GraphRunner::new(graph, pool(), config).unwrap();
        let report = runner.run();

        assert!(!report.success);
        assert_eq!(report.skipped, vec![b]);
        assert!(report.error.is_none());
        assert_eq!(*log.lock(), vec!["c", "d"]);
    }

    #[test]
    fn test_panic_reported_as_crash() {
        let mut graph = ElementGraph::new();
        let id = graph
            .add_element(FunctionElement::new(|_ctx| -> Status { panic!("worker exploded") }))
            .unwrap();
        graph.finalize().unwrap();

        let runner = GraphRunner::new(graph, pool(), RunnerConfig::default()).unwrap();
        let report = runner.run();

        let outcome = report.outcome(id).unwrap();
        assert!(outcome.crashed);
        assert!(outcome.error.as_deref().unwrap_or_default().contains("worker exploded"));
    }

    #[test]
    fn test_unfinalized_graph_rejected() {
        let mut graph = ElementGraph::new();
        graph.add_element(crate::element::NoopElement).unwrap();
        assert!(GraphRunner::new(graph, pool(), RunnerConfig::default()).is_err());
    }
}
