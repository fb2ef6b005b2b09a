use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use shadepool_core::Address;
use shadepool_state::{EventProjector, TreeKind};

/// Accept connections until the listener fails.
pub async fn serve_rpc(
    listener: TcpListener,
    auth_token: Option<String>,
    projector: Arc<Mutex<EventProjector>>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "rpc connection");
        let projector = Arc::clone(&projector);
        let auth_token = auth_token.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, auth_token, projector).await {
                warn!(%peer, error = %e, "rpc connection closed");
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    auth_token: Option<String>,
    projector: Arc<Mutex<EventProjector>>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let resp = match serde_json::from_str::<Value>(&line) {
            Ok(v) => handle_request(v, &auth_token, &projector),
            Err(_) => json!({"ok": false, "error": "invalid json"}),
        };
        write.write_all(resp.to_string().as_bytes()).await?;
        write.write_all(b"\n").await?;
    }
    Ok(())
}

fn param<T: serde::de::DeserializeOwned>(v: &Value, key: &str) -> Result<T, Value> {
    let raw = v
        .get(key)
        .cloned()
        .ok_or_else(|| json!({"ok": false, "error": format!("missing {key}")}))?;
    serde_json::from_value(raw).map_err(|_| json!({"ok": false, "error": format!("bad {key}")}))
}

pub fn handle_request(
    v: Value,
    auth_token: &Option<String>,
    projector: &Arc<Mutex<EventProjector>>,
) -> Value {
    if let Some(expected) = auth_token {
        match v.get("auth").and_then(|a| a.as_str()) {
            Some(tok) if tok == expected => {}
            _ => return json!({"ok": false, "error": "Unauthorized"}),
        }
    }
    let method = match v.get("method").and_then(|m| m.as_str()) {
        Some(m) => m,
        None => return json!({"ok": false, "error": "missing method"}),
    };
    let projector = match projector.lock() {
        Ok(p) => p,
        Err(_) => return json!({"ok": false, "error": "projector unavailable"}),
    };

    match method {
        "ping" => json!({"ok": true}),
        "get_tree" => {
            let kind: TreeKind = match param(&v, "kind") {
                Ok(k) => k,
                Err(e) => return e,
            };
            let tree_id: u64 = match param(&v, "tree_id") {
                Ok(id) => id,
                Err(e) => return e,
            };
            json!({"ok": true, "tree": projector.tree(kind, tree_id)})
        }
        "get_entries" => {
            let ids: Vec<u64> = match param(&v, "ids") {
                Ok(ids) => ids,
                Err(e) => return e,
            };
            json!({"ok": true, "entries": projector.entries(&ids)})
        }
        "get_entries_by_address" => {
            let address: Address = match param(&v, "address") {
                Ok(a) => a,
                Err(e) => return e,
            };
            json!({"ok": true, "entries": projector.entries_by_address(&address)})
        }
        "get_stats" => json!({"ok": true, "stats": projector.stats()}),
        _ => json!({"ok": false, "error": "unknown method"}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadepool_core::{Amount, Fr, Hash32};
    use shadepool_state::{ChainEvent, EventMeta, LoggedEvent};

    fn projector() -> Arc<Mutex<EventProjector>> {
        let events = [
            LoggedEvent {
                meta: EventMeta {
                    block_number: 1,
                    block_timestamp: 12,
                    tx_hash: Hash32([1; 32]),
                    log_index: 0,
                },
                event: ChainEvent::WormholeEntry {
                    entry_id: 3,
                    token: Address([0xee; 20]),
                    from: Address([0xd0; 20]),
                    to: Address([0xb0; 20]),
                    token_id: 0,
                    amount: Amount::from_units(5),
                },
            },
            LoggedEvent {
                meta: EventMeta {
                    block_number: 2,
                    block_timestamp: 24,
                    tx_hash: Hash32([2; 32]),
                    log_index: 0,
                },
                event: ChainEvent::ShieldedTransfer {
                    tree_id: 0,
                    start_index: 0,
                    commitments: vec![Fr::from_u64(7), Fr::from_u64(8)],
                    nullifiers: vec![Fr::from_u64(1)],
                    withdrawals: vec![],
                },
            },
        ];
        Arc::new(Mutex::new(EventProjector::replay(&events).unwrap()))
    }

    #[test]
    fn auth_is_enforced() {
        let p = projector();
        let token = Some("secret".to_string());
        let resp = handle_request(json!({"method": "ping"}), &token, &p);
        assert_eq!(resp["error"], "Unauthorized");
        let resp = handle_request(json!({"method": "ping", "auth": "secret"}), &token, &p);
        assert_eq!(resp["ok"], true);
    }

    #[test]
    fn serves_tree_and_missing_tree() {
        let p = projector();
        let resp = handle_request(
            json!({"method": "get_tree", "kind": "shielded", "tree_id": 0}),
            &None,
            &p,
        );
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["tree"]["size"], 2);

        let resp = handle_request(
            json!({"method": "get_tree", "kind": "wormhole", "tree_id": 0}),
            &None,
            &p,
        );
        assert!(resp["tree"].is_null());
    }

    #[test]
    fn entries_by_id_and_address() {
        let p = projector();
        let resp = handle_request(json!({"method": "get_entries", "ids": [3, 9]}), &None, &p);
        assert_eq!(resp["entries"].as_array().unwrap().len(), 1);

        let resp = handle_request(
            json!({"method": "get_entries_by_address", "address": Address([0xb0; 20])}),
            &None,
            &p,
        );
        assert_eq!(resp["entries"][0]["entry_id"], 3);
    }

    #[test]
    fn rejects_bad_params() {
        let p = projector();
        let resp = handle_request(json!({"method": "get_tree", "tree_id": 0}), &None, &p);
        assert_eq!(resp["error"], "missing kind");
        let resp = handle_request(json!({"method": "get_entries", "ids": "x"}), &None, &p);
        assert_eq!(resp["error"], "bad ids");
        let resp = handle_request(json!({"method": "mine"}), &None, &p);
        assert_eq!(resp["error"], "unknown method");
    }
}
