//! Rate-limited MX resolution for riskgate.
//!
//! Fronts a fixed pool of public DNS resolvers with per-upstream token
//! buckets and round-robin rotation, implementing the core's
//! [`MxResolve`](riskgate_core::mx::MxResolve) seam.

pub mod pool;
pub mod resolver;

pub use pool::{default_pool, Upstream, BUCKET_CAPACITY, REFILL_INTERVAL};
pub use resolver::{MxResolver, LOOKUP_TIMEOUT};
