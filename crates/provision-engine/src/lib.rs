//! Provisioning Engine
//!
//! Generic orchestration kernel shared by every resource provisioner. It
//! answers three recurring questions: which steps must happen before others,
//! which may run concurrently, and how much concurrency is safe.
//!
//! ## Building blocks
//!
//! - [`ParallelProvisioner`]: runs a list of provisionables for one operation,
//!   merging consecutive parallel-eligible items into concurrently executed
//!   batches and flattening nested composites.
//! - [`OrderedProvisioner`]: compiles named steps with dependencies into
//!   sequential phases.
//! - [`BatchProvisioner`]: fixed-size groups run one after another to bound
//!   concurrent resource usage.
//!
//! ## Usage
//!
//! ```no_run
//! use provision_engine::{OrderedProvisionable, OrderedProvisioner};
//! use provision_types::{ProvisionContext, ProvisionOperation, Provisionable};
//! use std::sync::Arc;
//!
//! # fn authz_types() -> Vec<Arc<dyn Provisionable>> { Vec::new() }
//! # fn login_app() -> Vec<Arc<dyn Provisionable>> { Vec::new() }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut op = OrderedProvisioner::new("tenant");
//! op.add_provisionables([
//!     OrderedProvisionable::new(authz_types).named("authz_types"),
//!     OrderedProvisionable::new(login_app)
//!         .named("login_app")
//!         .after(["authz_types"]),
//! ]);
//!
//! let root = op.create_provisionable()?;
//! let ctx = ProvisionContext::new();
//! ProvisionOperation::Provision.execute(&ctx, root.as_ref()).await?;
//! ProvisionOperation::Validate.execute(&ctx, root.as_ref()).await?;
//! ProvisionOperation::Close.execute(&ctx, root.as_ref()).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod batch;
pub mod config;
pub mod ordered;
pub mod parallel;
pub mod telemetry;

// Re-exports
pub use batch::BatchProvisioner;
pub use config::{EngineConfig, LoggingConfig};
pub use ordered::{OrderedProvisionable, OrderedProvisioner, Phase, PhasePlan};
pub use parallel::{ExecutionBatch, ParallelProvisioner, DEFAULT_WORKER_COUNT};
pub use telemetry::init_tracing;
