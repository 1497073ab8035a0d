//! Campaign ledger service.
//!
//! The authoritative core of a donation crowdfunding platform: donation
//! records with gateway-reported statuses, withdrawal reconciliation, the
//! campaign lifecycle state machine (including time-based expiry), and the
//! pre-activation verification gate.  Financial figures are always
//! recomputed from the donation and withdrawal sets, never cached.

pub mod aggregate;
pub mod api;
pub mod campaigns;
pub mod config;
pub mod db;
pub mod donations;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod sweep;
pub mod verify;
pub mod withdrawals;
