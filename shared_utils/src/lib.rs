//! Small helpers shared across the workspace crates.

pub mod env;

pub use env::{EnvError, get_env_parse_or, get_env_var, get_env_var_opt};
