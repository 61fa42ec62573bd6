//! Visitor classification and mask policy engine
//!
//! Classifies each page visit as a whitelisted human, a filtered visitor,
//! or a known bot, and decides whether to forward it to the offer page or
//! keep it on the decoy page.
//!
//! # Features
//!
//! - User-agent signature matching against a categorized bot table
//! - Reverse/forward DNS verification of claimed crawler identities
//! - IP reputation lookup with caching and graceful degradation
//! - Client-side fingerprint and behavioral-timing analysis
//! - Rotating honeypot form challenge with HMAC tokens
//! - Per-mask policy evaluation with a fixed precedence order
//!
//! # Example
//!
//! ```ignore
//! use maskgate::{EngineConfig, MaskEngine, RequestInfo, StaticMaskSource};
//! use maskgate::analytics::MemorySink;
//! use std::sync::Arc;
//!
//! let masks = Arc::new(StaticMaskSource::from_path("masks.json".as_ref())?);
//! let engine = MaskEngine::new(EngineConfig::default(), masks, Arc::new(MemorySink::new()))?;
//!
//! let decision = engine.process(&request).await;
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod honeypot;
pub mod policy;
pub mod reputation;
pub mod signals;

pub use config::EngineConfig;
pub use engine::{sanitize_domain, MaskEngine, MaskSource, RequestInfo, StaticMaskSource};
pub use policy::{Action, BlockedReason, Decision, Mask, VisitorType};
pub use signals::VisitorSignals;
