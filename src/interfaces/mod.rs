//! Abstract interfaces for revreg collaborators.
//!
//! These traits define the contracts for:
//! - Issuer (accumulator generation and revocation deltas)
//! - Ledger (definition and entry publication)
//! - Tails server (public hosting of tails files)
//! - Index allocation (occupied credential slots per registry)
//!
//! One concrete implementation of each is bound per process and injected
//! into the lifecycle manager as `Arc<dyn Trait>`.

pub mod index_allocation;
pub mod issuer;
pub mod ledger;
pub mod tails_server;

pub use index_allocation::{AllocationError, AtMaxCredNum, CapacityPredicate, IndexAllocation};
pub use issuer::{CreatedRegistry, IssuanceType, Issuer, IssuerError, RegistryConfig};
pub use ledger::{Ledger, LedgerError};
pub use tails_server::TailsServer;
