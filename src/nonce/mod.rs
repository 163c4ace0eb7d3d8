//! Nonce Coordinator Module
//!
//! Lock-protected nonce issuance per (chain, address), with chain-truth
//! fallback and explicit eviction after a nonce-too-low rejection.

pub mod nonce_coordinator;
pub mod nonce_errors;
pub mod nonce_lock;

pub use nonce_coordinator::{nonce_lock_key, nonce_slot_key, NonceCoordinator};
pub use nonce_errors::{NonceError, NonceResult};
pub use nonce_lock::{LockPolicy, NonceLock};
