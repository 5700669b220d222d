//! Lifecycle operations and their dispatch

use crate::context::ProvisionContext;
use crate::error::{ProvisionError, Result};
use crate::provisionable::Provisionable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four lifecycle operations a [`Provisionable`] supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionOperation {
    /// Create or update; safe to repeat
    Provision,
    /// Read-only check that state matches expectation
    Validate,
    /// Remove associated state; tolerates "already absent"
    Cleanup,
    /// Release held resources
    Close,
}

impl ProvisionOperation {
    /// All operations in lifecycle order
    pub const ALL: [ProvisionOperation; 4] = [
        ProvisionOperation::Provision,
        ProvisionOperation::Validate,
        ProvisionOperation::Cleanup,
        ProvisionOperation::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionOperation::Provision => "Provision",
            ProvisionOperation::Validate => "Validate",
            ProvisionOperation::Cleanup => "Cleanup",
            ProvisionOperation::Close => "Close",
        }
    }

    /// Run this operation against `p`.
    ///
    /// Failures are wrapped in [`ProvisionError::Operation`] carrying the
    /// operation and the provisionable's name.
    pub async fn execute(&self, ctx: &ProvisionContext, p: &dyn Provisionable) -> Result<()> {
        let outcome = match self {
            ProvisionOperation::Provision => p.provision(ctx).await,
            ProvisionOperation::Validate => p.validate(ctx).await,
            ProvisionOperation::Cleanup => p.cleanup(ctx).await,
            ProvisionOperation::Close => p.close(ctx).await,
        };

        outcome.map_err(|source| ProvisionError::Operation {
            operation: *self,
            name: p.name().to_string(),
            source: Box::new(source),
        })
    }
}

impl fmt::Display for ProvisionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisionOperation {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        ProvisionOperation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProvisionError::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisionable::{Named, Parallelizable};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        named: Named,
        parallel: Parallelizable,
        seen: Mutex<Vec<ProvisionOperation>>,
        fail_cleanup: bool,
    }

    impl Recorder {
        fn new(fail_cleanup: bool) -> Self {
            Self {
                named: Named::new("recorder"),
                parallel: Parallelizable::none(),
                seen: Mutex::new(Vec::new()),
                fail_cleanup,
            }
        }

        fn record(&self, op: ProvisionOperation) {
            self.seen.lock().unwrap().push(op);
        }
    }

    #[async_trait]
    impl Provisionable for Recorder {
        fn name(&self) -> &str {
            self.named.name()
        }

        async fn provision(&self, _ctx: &ProvisionContext) -> Result<()> {
            self.record(ProvisionOperation::Provision);
            Ok(())
        }

        async fn validate(&self, _ctx: &ProvisionContext) -> Result<()> {
            self.record(ProvisionOperation::Validate);
            Ok(())
        }

        async fn cleanup(&self, _ctx: &ProvisionContext) -> Result<()> {
            self.record(ProvisionOperation::Cleanup);
            if self.fail_cleanup {
                return Err(ProvisionError::resource(self.name(), "still referenced"));
            }
            Ok(())
        }

        fn is_executable_in_parallel(
            &self,
            _ctx: &ProvisionContext,
            op: ProvisionOperation,
        ) -> bool {
            self.parallel.is_executable_in_parallel(op)
        }
    }

    #[tokio::test]
    async fn test_execute_dispatches_each_operation() {
        let ctx = ProvisionContext::new();
        let r = Recorder::new(false);

        for op in ProvisionOperation::ALL {
            op.execute(&ctx, &r).await.unwrap();
        }

        // default close is a no-op and records nothing
        assert_eq!(
            *r.seen.lock().unwrap(),
            vec![
                ProvisionOperation::Provision,
                ProvisionOperation::Validate,
                ProvisionOperation::Cleanup,
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_wraps_failures() {
        let ctx = ProvisionContext::new();
        let r = Recorder::new(true);

        let err = ProvisionOperation::Cleanup
            .execute(&ctx, &r)
            .await
            .unwrap_err();
        match err {
            ProvisionError::Operation {
                operation, name, ..
            } => {
                assert_eq!(operation, ProvisionOperation::Cleanup);
                assert_eq!(name, "recorder");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_operations() {
        assert_eq!(
            "validate".parse::<ProvisionOperation>().unwrap(),
            ProvisionOperation::Validate
        );
        assert_eq!(
            " Close ".parse::<ProvisionOperation>().unwrap(),
            ProvisionOperation::Close
        );

        let err = "Nuke".parse::<ProvisionOperation>().unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownOperation(ref s) if s == "Nuke"));
        assert_eq!(err.to_string(), "Unknown provision operation: Nuke");
    }

    #[test]
    fn test_display_matches_parse() {
        for op in ProvisionOperation::ALL {
            assert_eq!(op.to_string().parse::<ProvisionOperation>().unwrap(), op);
        }
    }
}
