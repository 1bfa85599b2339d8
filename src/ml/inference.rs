//! Published models for serving
//!
//! Each target maps to an immutable `Arc<PublishedModel>`. Publishing swaps
//! the reference, so a reader holding a snapshot never sees a partial update.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::TrainedModel;
use crate::domain::Target;
use crate::error::ForecastError;

#[derive(Debug)]
pub struct PublishedModel {
    /// Registry-wide, strictly increasing
    pub version: u64,
    pub published_at: DateTime<Utc>,
    pub model: TrainedModel,
}

/// Model Registry keyed by target
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<Target, Arc<PublishedModel>>>,
    next_version: AtomicU64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the model served for its target. Returns the new version.
    pub async fn publish(&self, model: TrainedModel) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let target = model.target();
        let model_id = model.model_id().to_string();
        let published = Arc::new(PublishedModel {
            version,
            published_at: Utc::now(),
            model,
        });

        let previous = self.models.write().await.insert(target, published);
        info!(
            target = %target,
            version,
            model_id = %model_id,
            replaced = previous.map(|p| p.version),
            "Published model"
        );
        version
    }

    pub async fn snapshot(&self, target: Target) -> Option<Arc<PublishedModel>> {
        self.models.read().await.get(&target).cloned()
    }

    /// Like [`snapshot`](Self::snapshot) but absence is an error
    pub async fn require(&self, target: Target) -> Result<Arc<PublishedModel>, ForecastError> {
        self.snapshot(target)
            .await
            .ok_or(ForecastError::ModelUnavailable { target })
    }

    pub async fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self.models.read().await.keys().copied().collect();
        targets.sort();
        targets
    }

    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }
}
