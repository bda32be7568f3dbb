use std::sync::Arc;

use secrecy::Secret;

use crate::plugin::Outbound;

/// One managed bot endpoint: its stable name, credential and send capability.
#[derive(Clone)]
pub struct SessionHandle {
    name: String,
    token: Secret<String>,
    outbound: Arc<dyn Outbound>,
}

impl SessionHandle {
    pub fn new(name: impl Into<String>, token: Secret<String>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            name: name.into(),
            token,
            outbound,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &Secret<String> {
        &self.token
    }

    pub fn outbound(&self) -> &Arc<dyn Outbound> {
        &self.outbound
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Runtime connectivity of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never registered, or the last registration attempt failed.
    Unregistered,
    Running,
    /// Stopped on request, or the polling loop ended on its own.
    Stopped,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unregistered => "Down (unregistered)",
            Self::Running => "Up",
            Self::Stopped => "Down (stopped)",
        }
    }

    pub fn is_up(self) -> bool {
        self == Self::Running
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
