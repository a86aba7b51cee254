//! This crate provides the core logic of the account pool:
//! - Pool scanning and claim state classification
//! - Ownership lookup in both directions (account to owner, owner to accounts)
//! - Allocation with verified claims
//! - Reclamation: untag, move back to the pool root and IAM teardown
//!
//! AWS is reached through the capability traits in [`aws`]; the SDK-backed
//! [`aws::CloudGateway`] is used in production, the in-memory gateway in
//! `testing` (feature `integ-test`) in tests.

pub mod account;
pub mod allocator;
pub mod aws;
pub mod config;
mod errors;
pub mod ownership;
pub mod reclaim;
pub mod scanner;

#[cfg(any(test, feature = "integ-test"))]
pub mod testing;

// Re-exports for a small, focused public API
pub use account::{Account, AccountStatus, ClaimState, Tags};
pub use allocator::Allocator;
pub use aws::{AwsError, CloudGateway};
pub use config::{AllocationSettings, PayerConfig, PoolConfig, ReclaimSettings};
pub use errors::{PoolError, PoolResult};
pub use ownership::{OwnerMap, OwnershipIndex};
pub use reclaim::{AccountReport, Confirm, ReclaimOutcome, ReclaimTarget, Reclaimer};
pub use scanner::PoolScanner;
