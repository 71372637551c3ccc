pub mod config;
pub mod controller;
pub mod error;
pub mod invoker;
pub mod near_rpc;
pub mod reading;
pub mod redirect;
pub mod resolver;
pub mod session;
pub mod transaction;
pub mod wallets;
pub mod workflow;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
