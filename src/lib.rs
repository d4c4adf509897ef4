// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stratus
//!
//! A declarative resource-graph engine for cloud deployments.
//!
//! ## Overview
//!
//! Stratus turns a set of resource declarations into a provisioned cloud
//! deployment:
//!
//! - Properties may embed **deferred values**: outputs of other resources
//!   that only exist once those resources have been provisioned
//! - Cross-references are derived into a dependency DAG and ordered
//!   topologically before any remote call is made
//! - Execution is concurrent: a resource waits only on its direct
//!   producers, and a failure skips exactly the transitive dependents
//!   while independent branches keep going
//!
//! ## Architecture
//!
//! 1. **Declare**: the stack registers resources whose properties
//!    reference each other's not-yet-known outputs
//! 2. **Plan**: declarations are ordered into a deployment plan; duplicate
//!    names and dependency cycles are rejected here, before any API call
//! 3. **Apply**: the executor provisions the plan against the cloud
//!    control plane and propagates resolved outputs downstream
//!
//! ## Modules
//!
//! - [`config`]: stack file parsing, validation, and fingerprinting
//! - [`graph`]: deferred values, the dependency graph, plan, and executor
//! - [`provider`]: control-plane API client and provisioner
//! - [`stack`]: the built-in web-server deployment
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: web-server
//!   environment: dev
//!
//! location: westus
//!
//! admin:
//!   username: webmaster
//!
//! vm:
//!   size: Standard_A0
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod provider;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormat, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, SpecHasher, StackConfig, find_config_file};
pub use error::{Result, StratusError};
pub use graph::{
    DeploymentPlan, Evaluator, ExecutionResult, Executor, Output, Property, ResourceHandle,
    ResourceStatus,
};
pub use provider::{CloudClient, CloudProvisioner, Provision, ResourceKind};
pub use stack::web_server_stack;
