//! Backend implementations of [`MediaDevices`](crate::MediaDevices) and
//! [`Surface`](crate::Surface).
//!
//! Browser and native backends implement the traits in the embedding
//! application. The simulated backend here is used by tests and the demo
//! tool.

pub mod simulated;
