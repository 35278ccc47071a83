//! Aspect hooks around element phases
//!
//! Aspects observe an element's lifecycle without touching its logic. A
//! BEGIN hook may veto the phase by returning an error; FINISH hooks only
//! observe the phase's status.

use super::types::AspectKind;
use crate::core::errors::Status;

/// Instrumentation invoked before and after each lifecycle phase.
///
/// Every hook defaults to a no-op, so an aspect only overrides the points it
/// cares about.
pub trait Aspect: Send + Sync {
    /// Name used in logs and error reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn begin_init(&self, _element: &str) -> Status {
        Ok(())
    }

    fn finish_init(&self, _element: &str, _status: &Status) {}

    fn begin_run(&self, _element: &str) -> Status {
        Ok(())
    }

    fn finish_run(&self, _element: &str, _status: &Status) {}

    fn begin_destroy(&self, _element: &str) -> Status {
        Ok(())
    }

    fn finish_destroy(&self, _element: &str, _status: &Status) {}
}

/// Ordered set of aspects owned by one element
#[derive(Default)]
pub struct AspectManager {
    element: String,
    aspects: Vec<Box<dyn Aspect>>,
}

impl AspectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, aspect: Box<dyn Aspect>) {
        self.aspects.push(aspect);
    }

    /// Name passed to every hook; follows the owning element's name
    pub fn set_name(&mut self, element: impl Into<String>) {
        self.element = element.into();
    }

    pub fn name(&self) -> &str {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Dispatch one hook point across all aspects in registration order.
    ///
    /// BEGIN hooks stop at the first error and return it. FINISH hooks all
    /// run and receive `current`; they always yield `Ok`.
    pub fn reflect(&self, kind: AspectKind, current: &Status) -> Status {
        for aspect in &self.aspects {
            let element = self.element.as_str();
            let status = match kind {
                AspectKind::BeginInit => aspect.begin_init(element),
                AspectKind::BeginRun => aspect.begin_run(element),
                AspectKind::BeginDestroy => aspect.begin_destroy(element),
                AspectKind::FinishInit => {
                    aspect.finish_init(element, current);
                    Ok(())
                }
                AspectKind::FinishRun => {
                    aspect.finish_run(element, current);
                    Ok(())
                }
                AspectKind::FinishDestroy => {
                    aspect.finish_destroy(element, current);
                    Ok(())
                }
            };
            if let Err(e) = status {
                tracing::warn!(
                    element,
                    aspect = aspect.name(),
                    "Hook {} rejected the phase: {}",
                    kind.as_str(),
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AspectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.aspects.iter().map(|aspect| aspect.name()).collect();
        f.debug_struct("AspectManager")
            .field("element", &self.element)
            .field("aspects", &names)
            .finish()
    }
}

/// Logs every hook point through `tracing`
pub struct LoggingAspect;

impl Aspect for LoggingAspect {
    fn name(&self) -> &str {
        "logging"
    }

    fn begin_init(&self, element: &str) -> Status {
        tracing::debug!("Element {} init begin", element);
        Ok(())
    }

    fn finish_init(&self, element: &str, status: &Status) {
        log_finish("init", element, status);
    }

    fn begin_run(&self, element: &str) -> Status {
        tracing::debug!("Element {} run begin", element);
        Ok(())
    }

    fn finish_run(&self, element: &str, status: &Status) {
        log_finish("run", element, status);
    }

    fn begin_destroy(&self, element: &str) -> Status {
        tracing::debug!("Element {} destroy begin", element);
        Ok(())
    }

    fn finish_destroy(&self, element: &str, status: &Status) {
        log_finish("destroy", element, status);
    }
}

fn log_finish(phase: &str, element: &str, status: &Status) {
    match status {
        Ok(()) => tracing::info!("Element {} {} finished", element, phase),
        Err(e) => tracing::warn!("Element {} {} finished with error: {}", element, phase, e),
    }
}
