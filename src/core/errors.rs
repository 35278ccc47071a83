use std::collections::HashMap;
use thiserror::Error;

/// Unified error type for element construction and execution
#[derive(Debug, Error)]
pub enum ElementError {
    /// A frozen attribute was mutated, or one-time setup was repeated
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        element: Option<String>,
    },

    /// A graph-building call received an argument it cannot accept
    #[error("Precondition violated: {message}")]
    Precondition {
        message: String,
        context: HashMap<String, String>,
    },

    /// User code returned a failure status
    #[error("Element {element} failed: {message}")]
    Failed {
        element: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A panic escaped user code and was caught at the execution boundary
    #[error("Element crashed: {message}")]
    Crashed { message: String },

    /// An aspect hook rejected the phase
    #[error("Aspect {aspect} rejected {hook}: {message}")]
    Aspect {
        aspect: String,
        hook: String,
        message: String,
    },

    /// Serialization errors (parameter values, config files)
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ElementError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
            element: None,
        }
    }

    /// Create a configuration error naming the rejected field and element
    pub fn frozen<F: Into<String>, E: Into<String>>(field: F, element: E) -> Self {
        let field = field.into();
        Self::Configuration {
            message: format!("cannot change `{}` after the graph is finalized", field),
            field: Some(field),
            element: Some(element.into()),
        }
    }

    /// Create a precondition error
    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::Precondition {
            message: message.into(),
            context: HashMap::new(),
        }
    }

    /// Add context to a precondition error
    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        if let Self::Precondition { ref mut context, .. } = self {
            context.insert(key.into(), value.into());
        }
        self
    }

    /// Create a user-code failure
    pub fn failed<S: Into<String>, M: Into<String>>(element: S, message: M) -> Self {
        Self::Failed {
            element: element.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a user-code failure with source
    pub fn failed_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        element: S,
        source: E,
    ) -> Self {
        Self::Failed {
            element: element.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a crash error from a caught panic message
    pub fn crashed<S: Into<String>>(message: S) -> Self {
        Self::Crashed {
            message: message.into(),
        }
    }

    /// Create an aspect rejection
    pub fn aspect<A: Into<String>, H: Into<String>, M: Into<String>>(
        aspect: A,
        hook: H,
        message: M,
    ) -> Self {
        Self::Aspect {
            aspect: aspect.into(),
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors that abort graph construction
    pub fn is_fatal_to_construction(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Precondition { .. })
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Self::Crashed { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Precondition { .. } => "precondition",
            Self::Failed { .. } => "failed",
            Self::Crashed { .. } => "crash",
            Self::Aspect { .. } => "aspect",
            Self::Serialization { .. } => "serialization",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ElementError>;

/// Outcome of a lifecycle phase or a user-code call
pub type Status = Result<()>;

impl From<serde_json::Error> for ElementError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for ElementError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

/// User code written against `anyhow` folds into an ordinary failure
impl From<anyhow::Error> for ElementError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed {
            element: String::new(),
            message: format!("{:#}", err),
            source: None,
        }
    }
}
