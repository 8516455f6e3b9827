// Directory client: the one piece of infrastructure this network has that
// the teacher's pure-gossip chain does not — a rendezvous server miners
// register with on startup and periodically heartbeat, so a fresh miner has
// somewhere to ask "who else is online" (spec section 4.6 / section 6's
// `Register`/`GetNodes` directory RPCs).

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::MinerNetSettings;
use crate::crypto::keys::PublicKey;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unreachable(String),
    #[error("directory returned malformed response")]
    MalformedResponse,
}

#[derive(Serialize)]
struct RegisterRequest {
    pub_key: String,
    addr: SocketAddr,
}

#[derive(Deserialize)]
struct RegisterResponse {
    settings: MinerNetSettings,
}

#[derive(Serialize)]
struct GetNodesRequest {
    pub_key: String,
}

#[derive(Deserialize)]
struct GetNodesResponse {
    addrs: Vec<SocketAddr>,
}

/// Registers this miner with the directory, returning the network-wide
/// consensus settings it hands back.
pub async fn register(directory_addr: &str, pub_key: &PublicKey, listen_addr: SocketAddr) -> Result<MinerNetSettings, DirectoryError> {
    let req = RegisterRequest {
        pub_key: pub_key.to_der_hex(),
        addr: listen_addr,
    };
    let body = post(directory_addr, "register", &req).await?;
    let parsed: RegisterResponse = serde_json::from_slice(&body).map_err(|_| DirectoryError::MalformedResponse)?;
    Ok(parsed.settings)
}

/// Asks the directory for peer addresses to bootstrap gossip from.
pub async fn get_nodes(directory_addr: &str, pub_key: &PublicKey) -> Result<Vec<SocketAddr>, DirectoryError> {
    let req = GetNodesRequest {
        pub_key: pub_key.to_der_hex(),
    };
    let body = post(directory_addr, "get-nodes", &req).await?;
    let parsed: GetNodesResponse = serde_json::from_slice(&body).map_err(|_| DirectoryError::MalformedResponse)?;
    Ok(parsed.addrs)
}

/// Sends a liveness heartbeat so the directory keeps listing this miner.
pub async fn heartbeat(directory_addr: &str, pub_key: &PublicKey) -> Result<(), DirectoryError> {
    let req = GetNodesRequest {
        pub_key: pub_key.to_der_hex(),
    };
    post(directory_addr, "heartbeat", &req).await?;
    Ok(())
}

async fn post<T: Serialize>(directory_addr: &str, path: &str, body: &T) -> Result<Vec<u8>, DirectoryError> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let json = serde_json::to_vec(body).map_err(|_| DirectoryError::MalformedResponse)?;
    let request = format!(
        "POST /{path} HTTP/1.1\r\nHost: directory\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        json.len()
    );

    let mut stream = tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(directory_addr))
        .await
        .map_err(|_| DirectoryError::Unreachable("connect timed out".to_string()))?
        .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

    stream.write_all(request.as_bytes()).await.map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
    stream.write_all(&json).await.map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.map_err(|e| DirectoryError::Unreachable(e.to_string()))?;

    let header_end = raw.windows(4).position(|w| w == b"\r\n\r\n").ok_or(DirectoryError::MalformedResponse)?;
    Ok(raw[header_end + 4..].to_vec())
}
