//! Registry lifecycle services.

pub mod cache;
pub mod lifecycle;
pub mod locks;
pub mod query;
pub mod tails_publisher;

pub use cache::RecordCache;
pub use lifecycle::{CapacityStatus, PendingPublication, RecoveryReport, RegistryLifecycleManager};
pub use locks::KeyedLocks;
pub use query::RecordQueryService;
pub use tails_publisher::TailsPublisher;
