//! Optional enrichment stages
//!
//! Both stages here are optional: their failures are caught by the
//! pipeline and degrade to empty result blocks, never a failed session.

pub mod ai;
pub mod domain;

pub use ai::AiClient;
pub use domain::DomainAnalyzer;
