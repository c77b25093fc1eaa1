//! CLI command handlers, one file per command.

mod copy;
mod fetch;
mod policy;

pub use copy::run_copy;
pub use fetch::run_fetch;
pub use policy::run_policy;
