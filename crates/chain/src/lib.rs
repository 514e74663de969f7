//! Contract resolution and read-only queries against an EVM JSON-RPC node.

pub mod abi;
pub mod proxy;
pub mod resolver;
pub mod rpc;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;
