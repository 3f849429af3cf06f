//! Core types and error taxonomy for the Nebula provisioning pipeline.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - **Types**: the certificate authority, network settings, configuration
//!   templates, and nodes, plus the request/view shapes handed to callers
//! - **Errors**: one taxonomy for every provisioning failure, [`ProvisionError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use nebula_core::{NodeRole, ProvisionError, Result};
//!
//! fn parse_role(raw: &str) -> Result<NodeRole> {
//!     raw.parse()
//! }
//! ```

mod error;
pub mod types;

pub use error::{ProvisionError, Result};
pub use types::*;
