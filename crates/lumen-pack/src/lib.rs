//! lumen-pack
//!
//! Declarative package applier for Lumen organizations. A package is a
//! versioned document declaring buckets, labels, checks, dashboards,
//! notification endpoints and rules, tasks, telegraf configs, variables, and
//! the label associations between them. The [`Service`] reconciles a parsed
//! package against an org's live state in two phases:
//!
//! 1. [`Service::dry_run`] — look up every declared resource on the platform
//!    and produce a [`Diff`] of what an apply would create or update, marking
//!    the package verified.
//! 2. [`Service::apply`] — execute the package in dependency tiers (secrets,
//!    then labels, then primary resources, then rules and label mappings)
//!    with bounded concurrency. Every successful write records a compensating
//!    action; if any tier fails the recorded actions are replayed in reverse
//!    so the org is left as it was found.
//!
//! Downstream platform services are consumed through the port traits in
//! [`ports`]; stacks (the durable handle grouping the resources a package
//! produced) are persisted through [`stack::StackStore`].

mod apply;
pub mod clone;
pub mod diff;
mod dry_run;
pub mod error;
pub mod package;
pub mod ports;
mod resolve;
mod rollback;
pub mod service;
pub mod stack;
pub mod store;
pub mod summary;

pub use clone::{CloneByOrg, CreateOpt, ResourceToClone};
pub use diff::Diff;
pub use error::{ApplyError, ErrorCode, PackError, ValidationErrors};
pub use package::{ApplyOpts, Pkg, PkgDocument};
pub use service::{DryRunOutcome, Platform, Service};
pub use stack::{Stack, StackResource, StackStore};
pub use summary::Summary;

/// Version tag stamped on every package document and stack resource this
/// service produces or accepts.
pub const API_VERSION: &str = "lumen.dev/v1alpha1";
