//! Operator-facing collaborators of the authentication engine
//!
//! Everything that touches the terminal or the OS keyring sits behind a
//! trait here so the orchestrator can be driven headless in tests.

pub mod prompt;
pub mod secrets;
pub mod status;

pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
pub use secrets::{KeyringSecretStore, MemorySecretStore, SecretStore};
pub use status::{RecordingReporter, StatusReporter, TerminalReporter};
