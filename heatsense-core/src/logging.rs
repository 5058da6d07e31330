//! Explicit logging context
//!
//! Components receive a [`LogContext`] at construction instead of reaching
//! for a process-wide logger. The context wraps a `tracing` span; child
//! contexts nest under their parent so every event carries the component
//! that emitted it. Create the root once per process and clone it into
//! constructors.

use tracing::{info_span, Span};

#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
    component: &'static str,
}

impl LogContext {
    /// Root context for a process
    pub fn root(service: &str) -> Self {
        Self {
            span: info_span!("heatsense", service = %service),
            component: "root",
        }
    }

    /// Context that records nothing, useful in tests
    pub fn disabled() -> Self {
        Self {
            span: Span::none(),
            component: "disabled",
        }
    }

    /// Derive a context for a named component nested under this one
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            span: info_span!(parent: &self.span, "component", name = component),
            component,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Run a closure inside this context's span
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.span.in_scope(f)
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::root("heatsense")
    }
}
