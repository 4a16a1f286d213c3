//! # validate-manifests Library
//!
//! An async-first library for validating Kubernetes manifests against their
//! JSON schemas, with multi-source schema resolution, in-memory schema
//! caching, and a concurrent worker pipeline.

pub mod cache;
pub mod cli;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod schema;

pub use cache::SchemaCache;
pub use cli::{Cli, VerbosityLevel};
pub use error::{RegistryError, Result, ValidationError};
pub use output::{Output, OutputFormat, Summary};
pub use pipeline::{CheckResult, RunConfig, Status, WorkerContext};
pub use registry::{new_registry, HttpRegistry, LocalRegistry, Registry};
pub use registry::DEFAULT_LOCATION as DEFAULT_SCHEMA_LOCATION;
pub use resolver::Resolution;
pub use resource::{Resource, Signature};
pub use schema::{CompiledSchema, Violation};
