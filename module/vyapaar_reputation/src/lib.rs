//! Reputation subsystems: URL threat checking (fail-closed, blocking) and
//! legal-entity verification (fail-open, advisory). Both cache through
//! `vyapaar_store::AtomicStore` and circuit-break through
//! `vyapaar_reliability::CircuitBreaker`.

pub mod legal_entity;
pub mod url_threat;

pub use legal_entity::{EntityLookup, GleifClient, LegalEntity, LegalEntityVerifier};
pub use url_threat::{GoogleSafeBrowsingClient, ThreatCheck, UrlThreatChecker};
