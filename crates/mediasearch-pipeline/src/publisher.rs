//! Version publisher.
//!
//! The sole entry point for making a version search-visible. The cutover
//! itself is one transaction in the database adapter; this component owns
//! the pre-flight checks and the audit logging around it.

use std::sync::Arc;

use mediasearch::ports::MediaDatabase;
use mediasearch::PipelineError;
use tracing::{debug, info};

pub struct Publisher {
    db: Arc<dyn MediaDatabase>,
}

impl Publisher {
    pub fn new(db: Arc<dyn MediaDatabase>) -> Self {
        Self { db }
    }

    /// Atomically promote `version_id` to ACTIVE, archive the previously
    /// current version, and flip the asset's current-version pointer.
    /// Idempotent when the version is already current and ACTIVE.
    pub async fn publish(&self, asset_id: &str, version_id: &str) -> Result<(), PipelineError> {
        let version = self
            .db
            .get_version(asset_id, version_id)
            .await?
            .ok_or_else(|| {
                PipelineError::NotFound(format!("version {version_id} of asset {asset_id}"))
            })?;
        debug!(
            asset_id,
            version_id,
            from_state = version.publish_state.as_str(),
            "publishing version"
        );

        self.db.publish_version(asset_id, version_id).await?;
        info!(asset_id, version_id, "version is now search-visible");
        Ok(())
    }
}
