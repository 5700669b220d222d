//! Operator confirmation for destructive or overriding provisioning steps

use tracing::warn;

/// Asks an operator to approve an action
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt with a fixed value
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmPrompt for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Interactive yes/no prompt on the controlling terminal.
///
/// Blocks the calling thread; call it before handing work to the runtime or
/// from `spawn_blocking`. Without a terminal the answer is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm {
    default: bool,
}

impl TerminalConfirm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer used on empty input and when no terminal is attached
    pub fn default_answer(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

impl ConfirmPrompt for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(self.default)
            .interact()
            .unwrap_or_else(|err| {
                warn!(prompt, error = %err, "Confirmation prompt unavailable");
                self.default
            })
    }
}

/// Prompt shown for actions against a production environment
pub fn production_prompt(prompt: &str) -> String {
    format!("PRODUCTION: {prompt}")
}

/// Outside production this approves without asking; in production it asks
pub fn confirm_for_production(prompt: &str, is_production: bool, asker: &dyn ConfirmPrompt) -> bool {
    if !is_production {
        return true;
    }
    asker.confirm(&production_prompt(prompt))
}
