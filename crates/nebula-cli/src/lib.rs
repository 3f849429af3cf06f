//! # nebula-cli
//!
//! Command-line front end for the Nebula node provisioning pipeline.
//!
//! ## Commands
//!
//! - **ca**: generate, replace, and inspect the certificate authority
//! - **node**: create, list, and delete nodes; fetch artifacts, configs,
//!   bundles, and install scripts
//! - **settings**: network-wide defaults (subnet, handshake port, validity)
//! - **template**: manage the Tera templates used to render `config.yml`

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
