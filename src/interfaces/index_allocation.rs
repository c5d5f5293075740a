//! Credential index allocation interface and capacity predicates.

use async_trait::async_trait;

/// Errors raised while consulting index allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("Unknown revocation registry: {0}")]
    UnknownRegistry(String),

    #[error("Index allocation unavailable: {0}")]
    Unavailable(String),
}

/// Reports how many credential indices of a registry are in use.
#[async_trait]
pub trait IndexAllocation: Send + Sync {
    async fn occupied_count(&self, revoc_reg_id: &str) -> Result<u32, AllocationError>;
}

/// Decides whether a registry has run out of capacity.
pub trait CapacityPredicate: Send + Sync {
    fn is_exhausted(&self, occupied: u32, max_cred_num: u32) -> bool;
}

/// Exhausted once every index up to `max_cred_num` is occupied.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtMaxCredNum;

impl CapacityPredicate for AtMaxCredNum {
    fn is_exhausted(&self, occupied: u32, max_cred_num: u32) -> bool {
        occupied >= max_cred_num
    }
}
