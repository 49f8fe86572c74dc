//! # charmctl-reconcile
//!
//! Reconciliation of charm applications against a remote control plane.
//!
//! [`Applications`] is the entry point. The pieces it drives are usable on
//! their own: [`resolver`] picks a base, [`resources`] plans pending
//! resources, [`deploy`] runs one of two deploy dialects, [`read`] waits for
//! convergence, and [`update`] applies a partial delta. [`retry`] holds the
//! single backoff loop they share.

pub mod applications;
pub mod config;
pub mod deploy;
pub mod error;
pub mod expose;
pub mod machines;
pub mod read;
pub mod resolver;
pub mod resources;
pub mod retry;
pub mod update;

pub use applications::Applications;
pub use deploy::DeployDialect;
pub use error::ReconcileError;
pub use resolver::{select_base, BaseRequest, PlatformBases};
pub use retry::{CancelToken, Retrier, RetryPolicy};
pub use update::merge_bindings;
