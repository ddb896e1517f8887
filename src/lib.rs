//! Deposit Advisor
//!
//! Answer-generation pipeline for a deposit / installment-savings advisory
//! assistant:
//! - Classifies each question (account status, recommendation, interest calculation)
//! - Routes retrieval by product category
//! - Composes a rule- and profile-conditioned prompt
//! - Accepts only whitelist-valid, grounded recommendations, with bounded retries
//! - Answers account-status questions deterministically, without generation
//!
//! TURN FLOW:
//! QUESTION → CLASSIFY → [STATUS] | RETRIEVE → COMPOSE → GENERATE → VALIDATE → GROUND? → ACCEPT | RETRY | FALLBACK

pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod error;
pub mod interest;
pub mod models;
pub mod profile;
pub mod prompt;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod status;
pub mod structured;
pub mod verification;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use models::*;
pub use classifier::IntentClassifier;
pub use controller::GenerationController;
pub use session::{Advisor, Session};
