//! Credential resolution seam.
//!
//! Resolution is a pure function of (configured default, conversation):
//! a per-conversation override wins, else the process-wide default applies.
//! No environment lookups happen inside the call path.

use colloquy_core::Conversation;

/// Resolves the reasoning-engine credential for one cycle
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    default_credential: Option<String>,
}

impl CredentialResolver {
    /// Create a resolver with an explicit default credential
    pub fn new(default_credential: Option<String>) -> Self {
        Self {
            default_credential: default_credential.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Read the default credential from an environment variable once,
    /// at construction time
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }

    /// Resolve the credential for a conversation, if any
    pub fn resolve(&self, conversation: &Conversation) -> Option<String> {
        conversation
            .credential_override
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.default_credential.clone())
    }
}
