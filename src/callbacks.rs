//! Transition hooks fired when a breaker changes state

use std::sync::Arc;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional hooks invoked on each breaker state transition.
///
/// Hooks run inside the transition's critical section; keep them short.
#[derive(Clone, Default)]
pub struct TransitionHooks {
    pub on_open: Option<Hook>,
    pub on_close: Option<Hook>,
    pub on_half_open: Option<Hook>,
}

impl TransitionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn opened(&self, circuit: &str) {
        if let Some(hook) = &self.on_open {
            hook(circuit);
        }
    }

    pub(crate) fn closed(&self, circuit: &str) {
        if let Some(hook) = &self.on_close {
            hook(circuit);
        }
    }

    pub(crate) fn half_opened(&self, circuit: &str) {
        if let Some(hook) = &self.on_half_open {
            hook(circuit);
        }
    }
}

impl std::fmt::Debug for TransitionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionHooks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
