//! The client-facing JSON-RPC surface.

pub mod server;

pub use server::{generate_rpc_auth_token, start_rpc_server, RpcState};
