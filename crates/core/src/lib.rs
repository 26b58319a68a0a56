//! # Askthen Core
//!
//! Ask-then-answer pipeline: routes a query to a role, asks for clarification
//! when the query is underspecified, answers, and reviews its own answer with
//! at most one corrective retry.
//!
//! ## Architecture
//!
//! - `completion/` - Backend seam (`CompletionClient`) and the OpenAI-compatible client
//! - `models` - Provider and model configuration
//! - `roles` - The role catalog
//! - `skills/` - One skill per stage (image, role, sufficiency, answer, judge)
//! - `orchestrator/` - Request context, stage machine and the orchestrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use askthen_core::models::ModelConfig;
//! use askthen_core::orchestrator::{AskRequest, Orchestrator};
//! use askthen_core::roles::RoleCatalog;
//! use std::sync::Arc;
//!
//! let client = ModelConfig::default().create_client()?;
//! let orchestrator = Orchestrator::new(client, Arc::new(RoleCatalog::default()));
//! let result = orchestrator.run(AskRequest::new("What is the capital of France?")).await?;
//! ```

pub mod completion;
pub mod models;
pub mod orchestrator;
pub mod roles;
pub mod skills;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
