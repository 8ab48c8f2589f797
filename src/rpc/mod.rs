//! Connection management
//!
//! Endpoint health tracking, deterministic failover and the shared retry
//! policy. One [`ConnectionManager`] is built over the Solana RPC endpoints
//! (primary first, then backups) and another over the Jito block engines.

pub mod endpoint;
pub mod manager;
pub mod retry;
pub mod transport;

pub use endpoint::{Endpoint, EndpointHandle, HealthState, HealthThresholds};
pub use manager::{ConnectionManager, ConnectionSettings};
pub use retry::{RetryPolicy, RetrySchedule};
pub use transport::{RpcTransport, SolanaRpc};
