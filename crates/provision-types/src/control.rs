//! Data hand-off between provisioning steps
//!
//! A step can expose data it computes (e.g. event metadata derived while
//! provisioning) to a dependent step. The scheduler never inspects it.

use crate::context::ProvisionContext;
use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Optional capability exposing data for a dependent step to consume
#[async_trait]
pub trait ControlSource: Send + Sync {
    type Data: Send;

    async fn get_data(&self, ctx: &ProvisionContext) -> Result<Self::Data>;
}

/// Control source that always yields the same value
#[derive(Debug, Clone)]
pub struct StaticControlSource<T> {
    data: T,
}

impl<T> StaticControlSource<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[async_trait]
impl<T> ControlSource for StaticControlSource<T>
where
    T: Clone + Send + Sync,
{
    type Data = T;

    async fn get_data(&self, _ctx: &ProvisionContext) -> Result<T> {
        Ok(self.data.clone())
    }
}

/// Slot written by a producing step and read by the steps that run after it
#[derive(Debug)]
pub struct SharedControlSource<T> {
    label: String,
    slot: RwLock<Option<T>>,
}

impl<T> SharedControlSource<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            slot: RwLock::new(None),
        }
    }

    /// Publish (or replace) the data; re-provisioning overwrites the previous value
    pub async fn publish(&self, data: T) {
        *self.slot.write().await = Some(data);
    }

    pub async fn is_published(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

#[async_trait]
impl<T> ControlSource for SharedControlSource<T>
where
    T: Clone + Send + Sync,
{
    type Data = T;

    async fn get_data(&self, _ctx: &ProvisionContext) -> Result<T> {
        self.slot
            .read()
            .await
            .clone()
            .ok_or_else(|| ProvisionError::ControlSourceUnavailable(self.label.clone()))
    }
}
