//! Line-delimited JSON client for `shadepool-indexer`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use shadepool_core::Address;
use shadepool_state::{EntryRecord, ProjectorStats, TreeKind, TreeSnapshot};

use crate::capabilities::Indexer;
use crate::error::WalletError;

/// Indexer client; one connection per request.
pub struct RpcClient {
    addr: String,
    auth: Option<String>,
}

impl RpcClient {
    /// Client for the indexer at `addr`, sending `auth` with each request when set.
    pub fn new(addr: &str, auth: Option<String>) -> Self {
        Self {
            addr: addr.to_string(),
            auth,
        }
    }

    async fn send(&self, req: Value) -> Result<Value, WalletError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| WalletError::capability("indexer", e))?;
        let mut req = req;
        if let Some(token) = &self.auth {
            req["auth"] = json!(token);
        }
        let line = req.to_string();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        let mut reader = BufReader::new(stream);
        let mut resp = String::new();
        reader.read_line(&mut resp).await?;
        let v: Value = serde_json::from_str(&resp)?;
        if v.get("ok").and_then(|o| o.as_bool()) != Some(true) {
            let err = v
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("request failed");
            return Err(WalletError::capability("indexer", err));
        }
        Ok(v)
    }

    fn field<T: DeserializeOwned>(v: &Value, key: &str) -> Result<T, WalletError> {
        let raw = v.get(key).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(raw)?)
    }

    /// Check that the indexer answers.
    pub async fn ping(&self) -> Result<(), WalletError> {
        self.send(json!({"method": "ping"})).await.map(|_| ())
    }

    /// Projector counters.
    pub async fn stats(&self) -> Result<ProjectorStats, WalletError> {
        let v = self.send(json!({"method": "get_stats"})).await?;
        Self::field(&v, "stats")
    }
}

#[async_trait]
impl Indexer for RpcClient {
    async fn tree(&self, kind: TreeKind, tree_id: u64) -> Result<Option<TreeSnapshot>, WalletError> {
        let v = self
            .send(json!({"method": "get_tree", "kind": kind, "tree_id": tree_id}))
            .await?;
        Self::field(&v, "tree")
    }

    async fn entries(&self, ids: &[u64]) -> Result<Vec<EntryRecord>, WalletError> {
        let v = self
            .send(json!({"method": "get_entries", "ids": ids}))
            .await?;
        Self::field(&v, "entries")
    }

    async fn entries_by_address(&self, address: Address) -> Result<Vec<EntryRecord>, WalletError> {
        let v = self
            .send(json!({"method": "get_entries_by_address", "address": address}))
            .await?;
        Self::field(&v, "entries")
    }
}
