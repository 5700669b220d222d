//! Provisioning contracts
//!
//! Shared vocabulary for everything that provisions, validates or tears down
//! tenant resources (AuthZ types and edges, IDP accessors/mutators/policies,
//! organizations, login apps...). Resource-specific provisioners implement
//! [`Provisionable`]; the scheduling kernel in `provision-engine` composes them.
//!
//! ## Lifecycle
//!
//! | Operation   | Contract                                           |
//! |-------------|----------------------------------------------------|
//! | `Provision` | create or update, safe to repeat                   |
//! | `Validate`  | read-only, checks state matches expectation        |
//! | `Cleanup`   | remove state, tolerates "already absent"           |
//! | `Close`     | release held resources, always eventually invoked  |

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod confirm;
pub mod context;
pub mod control;
pub mod error;
pub mod operation;
pub mod provisionable;

// Re-exports
pub use confirm::{
    confirm_for_production, production_prompt, AutoConfirm, ConfirmPrompt, TerminalConfirm,
};
pub use context::{CancelHandle, ProvisionContext};
pub use control::{ControlSource, SharedControlSource, StaticControlSource};
pub use error::{ErrorList, ProvisionError, Result};
pub use operation::ProvisionOperation;
pub use provisionable::{Named, Parallelizable, Provisionable};
