//! Collaborators wrapped by the executor.
//!
//! Each adapter is an ordinary fallible operation whose error type
//! implements [`Describe`](crate::retry::Describe); none of them retry on
//! their own.

pub mod cache;
pub mod fs;
pub mod http;
