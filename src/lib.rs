#![doc = "bundle-generate: turn live workspace resources into declarative bundle configuration."]

//! A resource (job, pipeline, app) is fetched from the workspace, every
//! workspace file it references is registered for download and its reference
//! rewritten to the local copy, the resource is converted into a ranked value
//! tree and written as YAML, and finally the referenced files are downloaded.
//!
//! # Navigation
//! - Main entrypoint: [`generate::generate`]
//! - Building blocks: [`order::Order`], [`convert::convert_to_mapping`],
//!   [`saver::Saver`], [`download::Downloader`]
//! - Remote contract: [`workspace::WorkspaceClient`], [`workspace::ResourceClient`]

pub mod cli;
pub mod client;
pub mod convert;
pub mod download;
pub mod error;
pub mod generate;
pub mod load_config;
pub mod order;
pub mod resources;
pub mod saver;
pub mod value;
pub mod workspace;

pub use cli::{run, Cli, Commands};
pub use error::{GenerateError, WorkspaceError};
