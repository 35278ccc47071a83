//! A single element of the task graph
//!
//! Configuration happens through `&mut` methods while the owning graph is
//! still being built; every such method fails once the graph is finalized.
//! Everything used during execution takes `&self` and is safe to call from
//! any worker thread.

use super::aspect::{Aspect, AspectManager};
use super::behavior::{Element, ElementContext};
use super::events::EventSink;
use super::params::{LocalParams, ParamManager};
use super::signal::{CondvarGate, YieldGate};
use super::types::{
    AspectKind, ElementId, ElementKind, ElementRelation, Phase, RunState,
    SECONDARY_THREAD_COMMON_ID,
};
use crate::core::config::ElementConfig;
use crate::core::errors::{ElementError, Result, Status};
use crate::pool::{current_thread_hash, ThreadPool};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct ElementNode {
    id: ElementId,
    kind: ElementKind,
    session: String,
    name: String,
    loop_count: usize,
    level: i32,
    visible: bool,
    binding_index: Option<usize>,
    linkable: bool,

    pub(crate) dependence: BTreeSet<ElementId>,
    pub(crate) run_before: BTreeSet<ElementId>,
    pub(crate) belong: Option<ElementId>,

    left_depend: AtomicIsize,
    done: AtomicBool,
    gate: Arc<dyn YieldGate>,

    behavior: Mutex<Box<dyn Element>>,
    aspects: AspectManager,
    local_params: LocalParams,

    param_manager: Option<Arc<ParamManager>>,
    event_sink: Option<Arc<dyn EventSink>>,
    thread_pool: Option<Arc<dyn ThreadPool>>,

    info_set: bool,
    initialized: bool,
}

impl ElementNode {
    pub(crate) fn new(id: ElementId, kind: ElementKind, behavior: Box<dyn Element>) -> Self {
        Self {
            id,
            kind,
            session: format!("session_{}", uuid::Uuid::new_v4().simple()),
            name: String::new(),
            loop_count: 1,
            level: 0,
            visible: true,
            binding_index: None,
            linkable: true,
            dependence: BTreeSet::new(),
            run_before: BTreeSet::new(),
            belong: None,
            left_depend: AtomicIsize::new(0),
            done: AtomicBool::new(false),
            gate: Arc::new(CondvarGate::new()),
            behavior: Mutex::new(behavior),
            aspects: AspectManager::new(),
            local_params: LocalParams::new(),
            param_manager: None,
            event_sink: None,
            thread_pool: None,
            info_set: false,
            initialized: false,
        }
    }

    // ---- read accessors ----

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_group()
    }

    pub fn is_linkable(&self) -> bool {
        self.linkable
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier generated at construction, used when no name is given
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn binding_index(&self) -> Option<usize> {
        self.binding_index
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dependence(&self) -> &BTreeSet<ElementId> {
        &self.dependence
    }

    pub fn run_before(&self) -> &BTreeSet<ElementId> {
        &self.run_before
    }

    pub fn belong(&self) -> Option<ElementId> {
        self.belong
    }

    pub fn param_manager(&self) -> Option<&Arc<ParamManager>> {
        self.param_manager.as_ref()
    }

    pub fn event_sink(&self) -> Option<&Arc<dyn EventSink>> {
        self.event_sink.as_ref()
    }

    pub fn local_params(&self) -> &LocalParams {
        &self.local_params
    }

    pub fn aspects(&self) -> &AspectManager {
        &self.aspects
    }

    // ---- configuration (pre-finalize only) ----

    fn ensure_configurable(&self, field: &str) -> Result<()> {
        if self.initialized {
            warn!(element = %self.name, "Rejected change of `{}` after finalize", field);
            return Err(ElementError::frozen(field, self.name.clone()));
        }
        Ok(())
    }

    /// Set the name; an empty name falls back to the session id
    pub fn set_name(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_configurable("name")?;
        self.name = if name.is_empty() {
            self.session.clone()
        } else {
            name.to_string()
        };
        self.aspects.set_name(self.name.clone());
        Ok(self)
    }

    pub fn set_loop(&mut self, loop_count: usize) -> Result<&mut Self> {
        self.ensure_configurable("loop")?;
        self.loop_count = loop_count;
        Ok(self)
    }

    pub fn set_level(&mut self, level: i32) -> Result<&mut Self> {
        self.ensure_configurable("level")?;
        self.level = level;
        Ok(self)
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<&mut Self> {
        self.ensure_configurable("visible")?;
        self.visible = visible;
        Ok(self)
    }

    pub fn set_binding_index(&mut self, index: usize) -> Result<&mut Self> {
        self.ensure_configurable("binding_index")?;
        self.binding_index = Some(index);
        Ok(self)
    }

    /// Non-linkable elements reject dependency edges in either direction
    pub fn set_linkable(&mut self, linkable: bool) -> Result<&mut Self> {
        self.ensure_configurable("linkable")?;
        self.linkable = linkable;
        Ok(self)
    }

    pub fn set_thread_pool(&mut self, pool: Arc<dyn ThreadPool>) -> Result<&mut Self> {
        self.ensure_configurable("thread_pool")?;
        self.thread_pool = Some(pool);
        Ok(self)
    }

    /// Replace the default condition-variable gate with another implementation
    pub fn set_yield_gate(&mut self, gate: Arc<dyn YieldGate>) -> Result<&mut Self> {
        self.ensure_configurable("yield_gate")?;
        self.gate = gate;
        Ok(self)
    }

    pub fn add_aspect(&mut self, aspect: Box<dyn Aspect>) -> Result<&mut Self> {
        self.ensure_configurable("aspects")?;
        self.aspects.add(aspect);
        Ok(self)
    }

    /// Apply every attribute of `config` in one step
    pub fn apply_config(&mut self, config: &ElementConfig) -> Result<&mut Self> {
        config.validate()?;
        self.set_name(&config.name)?
            .set_loop(config.loop_count)?
            .set_level(config.level)?
            .set_visible(config.visible)?;
        if let Some(index) = config.binding_index {
            self.set_binding_index(index)?;
        }
        Ok(self)
    }

    pub(crate) fn bind_managers(
        &mut self,
        params: Option<Arc<ParamManager>>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<()> {
        if self.info_set {
            return Err(ElementError::Configuration {
                message: "element info can only be set once".to_string(),
                field: None,
                element: Some(self.name.clone()),
            });
        }
        self.ensure_configurable("element_info")?;
        self.param_manager = params;
        self.event_sink = events;
        self.info_set = true;
        Ok(())
    }

    pub(crate) fn ensure_linkable(&self) -> Result<()> {
        self.ensure_configurable("dependence")?;
        if !self.linkable {
            return Err(ElementError::precondition("element does not accept edges")
                .with_context("element", self.id.to_string()));
        }
        Ok(())
    }

    pub(crate) fn set_belong(&mut self, group: ElementId) -> Result<()> {
        self.ensure_configurable("belong")?;
        self.belong = Some(group);
        Ok(())
    }

    /// Freeze configuration; an unnamed element takes its session id
    pub(crate) fn finalize(&mut self) {
        if self.name.is_empty() {
            self.name = self.session.clone();
            self.aspects.set_name(self.name.clone());
        }
        self.initialized = true;
    }

    // ---- readiness ----

    pub fn left_depend(&self) -> isize {
        self.left_depend.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_runnable(&self) -> bool {
        self.left_depend() <= 0 && !self.is_done()
    }

    /// Reset readiness for a new activation
    pub fn before_run(&self) {
        self.done.store(false, Ordering::Release);
        self.recount_dependencies();
    }

    pub(crate) fn recount_dependencies(&self) {
        self.left_depend
            .store(self.dependence.len() as isize, Ordering::Release);
    }

    /// Returns the counter value after the decrement
    pub(crate) fn release_one_dependency(&self) -> isize {
        self.left_depend.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    // ---- signalling ----

    pub fn run_state(&self) -> RunState {
        self.gate.state()
    }

    /// Safe from any thread
    pub fn set_run_state(&self, state: RunState) {
        self.gate.set_state(state);
    }

    /// Handle a controller can keep to yield, resume or cancel this element
    pub fn yield_gate(&self) -> Arc<dyn YieldGate> {
        Arc::clone(&self.gate)
    }

    fn check_yield(&self) {
        self.gate.wait_while_yielded();
    }

    // ---- thread affinity ----

    /// Worker slot of the calling thread, or [`SECONDARY_THREAD_COMMON_ID`]
    pub fn thread_index(&self) -> isize {
        match &self.thread_pool {
            Some(pool) => pool
                .thread_index(current_thread_hash())
                .map(|index| index as isize)
                .unwrap_or(SECONDARY_THREAD_COMMON_ID),
            None => SECONDARY_THREAD_COMMON_ID,
        }
    }

    // ---- relations ----

    pub fn build_relation(&self) -> ElementRelation {
        ElementRelation {
            predecessors: self.dependence.clone(),
            successors: self.run_before.clone(),
            belong: self.belong,
        }
    }

    // ---- execution ----

    /// Ask the behaviour whether it is selected among group siblings.
    ///
    /// Takes the same lock `execute` holds for a whole phase, so calling this
    /// on an element that is running (or parked on a YIELD) blocks until that
    /// phase ends.
    pub fn is_match(&self) -> bool {
        let mut behavior = self.behavior.lock();
        let ctx = ElementContext::new(self);
        catch_unwind(AssertUnwindSafe(|| behavior.is_match(&ctx))).unwrap_or(false)
    }

    pub fn is_serializable(&self) -> bool {
        self.behavior.lock().is_serializable()
    }

    /// Run one lifecycle phase.
    ///
    /// Invisible elements succeed without touching hooks or user code. A
    /// panic anywhere inside the phase becomes the element's crash status.
    pub fn execute(&self, phase: Phase) -> Status {
        if !self.visible {
            debug!(element = %self.name, "Skipping {:?} of invisible element", phase);
            return Ok(());
        }

        let mut behavior = self.behavior.lock();
        let ctx = ElementContext::new(self);
        let outcome = catch_unwind(AssertUnwindSafe(|| match phase {
            Phase::Run => self.process_run(&mut **behavior, &ctx),
            Phase::Init | Phase::Destroy => self.process_once(phase, &mut **behavior, &ctx),
        }));

        match outcome {
            Ok(status) => status,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(element = %self.name, "Element crashed during {:?}: {}", phase, message);
                Err(behavior.crashed(message))
            }
        }
    }

    fn process_once(
        &self,
        phase: Phase,
        behavior: &mut dyn Element,
        ctx: &ElementContext<'_>,
    ) -> Status {
        let (begin, finish) = phase.hooks();
        self.reflect(begin, &Ok(()))?;
        let status = match phase {
            Phase::Init => behavior.init(ctx),
            _ => behavior.destroy(ctx),
        };
        self.reflect(finish, &status)?;
        status
    }

    fn process_run(&self, behavior: &mut dyn Element, ctx: &ElementContext<'_>) -> Status {
        let mut status = Ok(());
        let mut iteration = 0;
        while iteration < self.loop_count && self.run_state() != RunState::Cancel {
            self.reflect(AspectKind::BeginRun, &Ok(()))?;
            loop {
                status = behavior.run(ctx);
                self.check_yield();
                if !(status.is_ok() && behavior.is_hold(ctx)) {
                    break;
                }
            }
            self.reflect(AspectKind::FinishRun, &status)?;
            iteration += 1;
        }
        status
    }

    fn reflect(&self, kind: AspectKind, current: &Status) -> Status {
        if self.aspects.is_empty() {
            return Ok(());
        }
        self.aspects.reflect(kind, current)
    }
}

impl std::fmt::Debug for ElementNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("loop_count", &self.loop_count)
            .field("visible", &self.visible)
            .field("left_depend", &self.left_depend())
            .field("done", &self.is_done())
            .field("dependence", &self.dependence)
            .field("run_before", &self.run_before)
            .field("belong", &self.belong)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::behavior::{FunctionElement, NoopElement};
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    type Log = Arc<PlMutex<Vec<String>>>;

    struct Recorder {
        log: Log,
        veto_run: bool,
        veto_destroy: bool,
        cancel_after_run: Option<Arc<dyn YieldGate>>,
    }

    fn recorder(log: &Log) -> Recorder {
        Recorder {
            log: Arc::clone(log),
            veto_run: false,
            veto_destroy: false,
            cancel_after_run: None,
        }
    }

    impl Aspect for Recorder {
        fn begin_init(&self, _element: &str) -> Status {
            self.log.lock().push("begin_init".into());
            Ok(())
        }
        fn finish_init(&self, _element: &str, status: &Status) {
            self.log.lock().push(format!("finish_init:{}", status.is_ok()));
        }
        fn begin_run(&self, _element: &str) -> Status {
            self.log.lock().push("begin_run".into());
            if self.veto_run {
                return Err(ElementError::aspect("recorder", "begin_run", "veto"));
            }
            Ok(())
        }
        fn finish_run(&self, _element: &str, status: &Status) {
            self.log.lock().push(format!("finish_run:{}", status.is_ok()));
            if let Some(gate) = &self.cancel_after_run {
                gate.set_state(RunState::Cancel);
            }
        }
        fn begin_destroy(&self, _element: &str) -> Status {
            self.log.lock().push("begin_destroy".into());
            if self.veto_destroy {
                return Err(ElementError::aspect("recorder", "begin_destroy", "veto"));
            }
            Ok(())
        }
        fn finish_destroy(&self, _element: &str, status: &Status) {
            self.log
                .lock()
                .push(format!("finish_destroy:{}", status.is_ok()));
        }
    }

    struct Scripted {
        log: Log,
        holds: usize,
        fail_run: bool,
        fail_init: bool,
        fail_destroy: bool,
        panic_in_init: bool,
    }

    impl Element for Scripted {
        fn init(&mut self, _ctx: &ElementContext<'_>) -> Status {
            if self.panic_in_init {
                panic!("init exploded");
            }
            self.log.lock().push("init".into());
            if self.fail_init {
                return Err(ElementError::failed("scripted", "bad init"));
            }
            Ok(())
        }

        fn destroy(&mut self, _ctx: &ElementContext<'_>) -> Status {
            self.log.lock().push("destroy".into());
            if self.fail_destroy {
                return Err(ElementError::failed("scripted", "bad destroy"));
            }
            Ok(())
        }

        fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
            self.log.lock().push("run".into());
            if self.fail_run {
                return Err(ElementError::failed("scripted", "bad run"));
            }
            Ok(())
        }

        fn is_hold(&mut self, _ctx: &ElementContext<'_>) -> bool {
            if self.holds > 0 {
                self.holds -= 1;
                return true;
            }
            false
        }
    }

    fn scripted(log: &Log) -> Scripted {
        Scripted {
            log: Arc::clone(log),
            holds: 0,
            fail_run: false,
            fail_init: false,
            fail_destroy: false,
            panic_in_init: false,
        }
    }

    fn noop_node() -> ElementNode {
        ElementNode::new(ElementId(0), ElementKind::Element, Box::new(NoopElement))
    }

    fn node_with(behavior: impl Element + 'static, log: &Log, veto_run: bool) -> ElementNode {
        let mut node = ElementNode::new(ElementId(0), ElementKind::Element, Box::new(behavior));
        node.set_name("node").unwrap();
        node.add_aspect(Box::new(Recorder {
            veto_run,
            ..recorder(log)
        }))
        .unwrap();
        node
    }

    #[test]
    fn test_loop_alternates_hooks_and_run() {
        let log: Log = Arc::default();
        let mut node = node_with(scripted(&log), &log, false);
        node.set_loop(3).unwrap();

        assert!(node.execute(Phase::Run).is_ok());
        let expected: Vec<String> = ["begin_run", "run", "finish_run:true"]
            .repeat(3)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(*log.lock(), expected);
    }

    #[test]
    fn test_hold_repeats_within_one_iteration() {
        let log: Log = Arc::default();
        let mut behavior = scripted(&log);
        behavior.holds = 2;
        let node = node_with(behavior, &log, false);

        node.execute(Phase::Run).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["begin_run", "run", "run", "run", "finish_run:true"]
        );
    }

    #[test]
    fn test_failed_run_still_reaches_finish_hook() {
        let log: Log = Arc::default();
        let mut behavior = scripted(&log);
        behavior.fail_run = true;
        behavior.holds = 5;
        let node = node_with(behavior, &log, false);

        let status = node.execute(Phase::Run);
        assert!(matches!(status, Err(ElementError::Failed { .. })));
        assert_eq!(*log.lock(), vec!["begin_run", "run", "finish_run:false"]);
    }

    #[test]
    fn test_begin_run_veto_skips_run_and_finish() {
        let log: Log = Arc::default();
        let mut node = node_with(scripted(&log), &log, true);
        node.set_loop(2).unwrap();

        let status = node.execute(Phase::Run);
        assert!(matches!(status, Err(ElementError::Aspect { .. })));
        assert_eq!(*log.lock(), vec!["begin_run"]);
    }

    #[test]
    fn test_invisible_run_is_a_no_op() {
        let log: Log = Arc::default();
        let mut node = node_with(scripted(&log), &log, false);
        node.set_visible(false).unwrap();

        assert!(node.execute(Phase::Run).is_ok());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_zero_loop_runs_nothing() {
        let log: Log = Arc::default();
        let mut node = node_with(scripted(&log), &log, false);
        node.set_loop(0).unwrap();

        assert!(node.execute(Phase::Run).is_ok());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_init_brackets_user_code() {
        let log: Log = Arc::default();
        let node = node_with(scripted(&log), &log, false);

        node.execute(Phase::Init).unwrap();
        assert_eq!(*log.lock(), vec!["begin_init", "init", "finish_init:true"]);
    }

    #[test]
    fn test_failed_init_still_reaches_finish_hook() {
        let log: Log = Arc::default();
        let mut behavior = scripted(&log);
        behavior.fail_init = true;
        let node = node_with(behavior, &log, false);

        let status = node.execute(Phase::Init);
        assert!(matches!(status, Err(ElementError::Failed { .. })));
        assert_eq!(*log.lock(), vec!["begin_init", "init", "finish_init:false"]);
    }

    #[test]
    fn test_destroy_brackets_user_code() {
        let log: Log = Arc::default();
        let mut behavior = scripted(&log);
        behavior.fail_destroy = true;
        let mut node = ElementNode::new(ElementId(0), ElementKind::Element, Box::new(behavior));
        node.add_aspect(Box::new(recorder(&log))).unwrap();

        let status = node.execute(Phase::Destroy);
        assert!(matches!(status, Err(ElementError::Failed { .. })));
        assert_eq!(
            *log.lock(),
            vec!["begin_destroy", "destroy", "finish_destroy:false"]
        );
    }

    #[test]
    fn test_begin_destroy_veto_skips_destroy() {
        let log: Log = Arc::default();
        let mut node =
            ElementNode::new(ElementId(0), ElementKind::Element, Box::new(scripted(&log)));
        node.add_aspect(Box::new(Recorder {
            veto_destroy: true,
            ..recorder(&log)
        }))
        .unwrap();

        let status = node.execute(Phase::Destroy);
        assert!(matches!(status, Err(ElementError::Aspect { .. })));
        assert_eq!(*log.lock(), vec!["begin_destroy"]);
    }

    #[test]
    fn test_cancel_from_finish_hook_prevents_next_iteration() {
        let log: Log = Arc::default();
        let mut node =
            ElementNode::new(ElementId(0), ElementKind::Element, Box::new(scripted(&log)));
        node.set_loop(3).unwrap();
        let gate = node.yield_gate();
        node.add_aspect(Box::new(Recorder {
            cancel_after_run: Some(gate),
            ..recorder(&log)
        }))
        .unwrap();

        assert!(node.execute(Phase::Run).is_ok());
        assert_eq!(*log.lock(), vec!["begin_run", "run", "finish_run:true"]);
        assert_eq!(node.run_state(), RunState::Cancel);
    }

    #[test]
    fn test_default_predicates() {
        let node = noop_node();
        assert!(!node.is_match());
        assert!(node.is_serializable());
    }

    #[test]
    fn test_panic_becomes_crash_status() {
        let log: Log = Arc::default();
        let mut behavior = scripted(&log);
        behavior.panic_in_init = true;
        let node = node_with(behavior, &log, false);

        match node.execute(Phase::Init) {
            Err(ElementError::Crashed { message }) => assert_eq!(message, "init exploded"),
            other => panic!("Expected crash, got {:?}", other),
        }
        // The crash aborts the phase before FINISH_INIT
        assert_eq!(*log.lock(), vec!["begin_init"]);
    }

    #[test]
    fn test_formatted_panic_message_is_kept() {
        let node = ElementNode::new(
            ElementId(0),
            ElementKind::Element,
            Box::new(FunctionElement::new(|_ctx: &ElementContext<'_>| -> Status {
                panic!("code {}", 7)
            })),
        );
        match node.execute(Phase::Run) {
            Err(ElementError::Crashed { message }) => assert_eq!(message, "code 7"),
            other => panic!("Expected crash, got {:?}", other),
        }
    }

    #[test]
    fn test_mutators_rejected_after_finalize() {
        let mut node = noop_node();
        node.finalize();

        assert!(node.set_name("late").is_err());
        assert!(node.set_loop(2).is_err());
        assert!(node.set_level(1).is_err());
        assert!(node.set_visible(false).is_err());
        assert!(node.set_binding_index(3).is_err());
        assert!(matches!(
            node.set_loop(4),
            Err(ElementError::Configuration { .. })
        ));
        assert_eq!(node.loop_count(), 1);
    }

    #[test]
    fn test_empty_name_falls_back_to_session() {
        let mut node = noop_node();
        node.set_name("").unwrap();
        assert_eq!(node.name(), node.session());
        assert!(node.session().starts_with("session_"));
    }

    #[test]
    fn test_thread_index_without_pool() {
        let node = noop_node();
        assert_eq!(node.thread_index(), SECONDARY_THREAD_COMMON_ID);
    }

    #[test]
    fn test_yield_blocks_until_resumed() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = {
            let runs = Arc::clone(&runs);
            Arc::new(ElementNode::new(
                ElementId(0),
                ElementKind::Element,
                Box::new(FunctionElement::new(move |ctx: &ElementContext<'_>| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    ctx.local().insert("ran", true);
                    Ok(())
                })),
            ))
        };
        node.set_run_state(RunState::Yield);

        let worker = {
            let node = Arc::clone(&node);
            thread::spawn(move || node.execute(Phase::Run))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!worker.is_finished());

        node.set_run_state(RunState::Normal);
        assert!(worker.join().unwrap().is_ok());
        assert_eq!(node.local_params().get::<bool>("ran"), Some(true));
    }
}
