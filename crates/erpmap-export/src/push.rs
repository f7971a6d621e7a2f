//! Delivery of mapped rows to an ERP

use async_trait::async_trait;
use erpmap_model::Record;
use tracing::info;

use crate::Result;

/// Sends mapped rows to the named ERP
#[async_trait]
pub trait ErpPusher: Send + Sync {
    async fn push(&self, erp_name: &str, rows: &[Record]) -> Result<()>;
}

/// Pusher that only records what would have been sent
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPusher;

#[async_trait]
impl ErpPusher for LoggingPusher {
    async fn push(&self, erp_name: &str, rows: &[Record]) -> Result<()> {
        info!(erp = erp_name, rows = rows.len(), "Pushing rows to ERP");
        Ok(())
    }
}
