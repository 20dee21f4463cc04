//! Source-control output parsing and function-metadata sync for a
//! site-deployment runtime.
//!
//! This crate is a library, not a service: it has no `main`, installs no
//! `tracing` subscriber, and opens no listening sockets. The host process
//! wires a [`driver::CommandDriver`], a [`fs::Filesystem`], and an
//! [`operations::OperationsClient`] together with [`driver::Repository`]
//! and [`functions::FunctionMetadataManager`].

pub mod driver;
pub mod errors;
pub mod fs;
pub mod functions;
pub mod operations;
pub mod parse;
pub mod reader;

pub use driver::{CommandDriver, DriverConfig, ProcessCommandDriver, Repository};
pub use errors::{Error, Result};
pub use fs::{Filesystem, TokioFilesystem};
pub use functions::{FunctionEnvelope, FunctionHrefs, FunctionInput, FunctionMetadataManager, ManagerConfig};
pub use operations::{HttpOperationsClient, OperationsClient};
pub use parse::{ChangeSet, ChangeSetDetail, ChangeType, FileDiff, FileInfo, FileStatus, LineDiff};
pub use reader::Reader;
