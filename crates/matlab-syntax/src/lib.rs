//! matlab-syntax: API extraction for MATLAB source trees.
//!
//! Recovers a structured record per function, class and method from raw
//! `.m` text with pattern rules: no MATLAB runtime, no full grammar. The
//! entry points are [`parse_source`] for text already in memory and
//! [`parse_path`] for files on disk.
//!
//! ```
//! let result = matlab_syntax::parse_source(
//!     "matlab/+mr/makeDelay.m",
//!     "function del = makeDelay(delay)\n% makeDelay Create a delay event.\ndel.delay = delay;\n",
//! );
//! let main = result.main_function.unwrap();
//! assert_eq!(main.calling_pattern.as_deref(), Some("mr.makeDelay(...)"));
//! assert_eq!(main.parameters.names(), ["delay"]);
//! ```

pub mod classdef;
pub mod error;
pub mod extract;
pub mod locate;
pub mod model;
pub mod params;
pub mod path;
pub mod record;
pub mod text;

pub use error::ExtractError;
pub use extract::{parse_path, parse_source};
pub use model::*;
