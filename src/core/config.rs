use crate::core::errors::{ElementError, Result};
use serde::{Deserialize, Serialize};

/// Per-element scheduling attributes applied before the graph is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    /// Element name; empty means "use the session id"
    #[serde(default)]
    pub name: String,
    /// Number of RUN iterations per activation
    #[serde(default = "default_loop")]
    pub loop_count: usize,
    /// Scheduling hint, opaque to the element itself
    #[serde(default)]
    pub level: i32,
    /// Soft-disable switch: invisible elements stay wired but do nothing
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Opaque correlation id set by the owner
    #[serde(default)]
    pub binding_index: Option<usize>,
}

fn default_loop() -> usize {
    1
}

fn default_visible() -> bool {
    true
}

impl Default for ElementConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            loop_count: default_loop(),
            level: 0,
            visible: default_visible(),
            binding_index: None,
        }
    }
}

impl ElementConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_loop(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_binding_index(mut self, index: usize) -> Self {
        self.binding_index = Some(index);
        self
    }

    /// Validates configuration values
    pub fn validate(&self) -> Result<()> {
        if self.name.chars().any(|c| c == '"' || c == '\n') {
            return Err(ElementError::Configuration {
                message: "name cannot contain quotes or newlines".to_string(),
                field: Some("name".to_string()),
                element: Some(self.name.clone()),
            });
        }
        Ok(())
    }
}

/// What the driver does when an element returns a failed status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnFailure {
    /// Keep scheduling elements whose dependencies are satisfied
    Continue,
    /// Stop dispatching new elements and wait for in-flight ones
    Stop,
}

/// Worker pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Prefix for worker thread names
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_worker_count() -> usize {
    4
}

fn default_thread_name() -> String {
    "element-worker".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            thread_name: default_thread_name(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(ElementError::configuration(
                "worker_count must be greater than 0",
            ));
        }
        if self.worker_count > 1024 {
            return Err(ElementError::configuration(
                "worker_count cannot exceed 1024",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(ElementError::configuration("thread_name cannot be empty"));
        }
        Ok(())
    }
}

/// Driver behaviour for one graph activation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub on_failure: OnFailure,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            on_failure: OnFailure::Stop,
            pool: PoolConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }

    /// Parse and validate a YAML runner configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}
