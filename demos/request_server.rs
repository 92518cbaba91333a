//! Minimal HTTP server showing request lineages.
//!
//! Every accepted connection gets a fresh unit flagged as a request root.
//! `RequestInfo` is request-scoped, `HitCounter` is a singleton and `Cache`
//! carries no marker, so its scope is inferred from where it is first made.
//!
//! ```text
//! cargo run --example request_server
//! curl 'http://127.0.0.1:9502/?name=alice&cc=warm'
//! ```

use lineage_di::{
    Container, LoggingObserver, ScopeOptions, ScopeRegistry, ScopedStorage, UnitContext,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Default, Serialize)]
struct RequestInfo {
    path: String,
    name: String,
}

#[derive(Debug, Default)]
struct HitCounter {
    hits: AtomicU64,
}

#[derive(Debug, Default)]
struct Cache {
    entries: Mutex<HashMap<String, String>>,
}

#[derive(Serialize)]
struct Response<'a> {
    request: &'a RequestInfo,
    hits: u64,
    cache: HashMap<String, String>,
    handled_by: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = ScopeOptions::default().from_env()?;

    let mut registry = ScopeRegistry::new();
    registry
        .request_scoped("RequestInfo")
        .singleton("HitCounter")
        .declare("Cache");

    let storage = ScopedStorage::with_options(&options);
    let container = Arc::new(Container::with_options(registry, storage, &options));
    container.add_observer(Arc::new(LoggingObserver::with_prefix("[server]")));

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:9502".to_string());
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on http://{}", addr);

    loop {
        let (socket, peer) = listener.accept().await?;

        // Request boundary: a fresh root unit, flagged before any work runs
        let unit = container.storage().enter();
        container.begin_request(&unit);

        let c = container.clone();
        tokio::spawn(async move {
            if let Err(e) = handle(&c, &unit, socket).await {
                eprintln!("{}: {}", peer, e);
            }
        });
    }
}

async fn handle(
    container: &Arc<Container>,
    unit: &UnitContext,
    mut socket: TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (read, mut write) = socket.split();
    let mut lines = BufReader::new(read).lines();
    let request_line = lines.next_line().await?.unwrap_or_default();
    let target = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let params: HashMap<&str, &str> =
        query.split('&').filter_map(|kv| kv.split_once('=')).collect();

    let info = container.make(unit, "RequestInfo", || {
        Ok(RequestInfo {
            path: path.to_string(),
            name: params.get("name").copied().unwrap_or_default().to_string(),
        })
    })?;
    let counter = container.make(unit, "HitCounter", || Ok(HitCounter::default()))?;
    let hits = counter.hits.fetch_add(1, Ordering::Relaxed) + 1;

    let cache = container.make(unit, "Cache", || Ok(Cache::default()))?;
    if let Some(cc) = params.get("cc") {
        cache.entries.lock().map_err(|e| e.to_string())?.insert("cc".into(), cc.to_string());
    }

    // Fan out: the child sees this request's RequestInfo, not a new one
    let c = container.clone();
    let handled_by = unit
        .spawn(move |child| async move {
            let seen = c.make(&child, "RequestInfo", || Ok(RequestInfo::default()))?;
            Ok::<_, lineage_di::DiError>(format!("{} (name={})", child.id(), seen.name))
        })
        .await??;

    let snapshot = cache.entries.lock().map_err(|e| e.to_string())?.clone();
    let body = serde_json::to_string(&Response {
        request: &info,
        hits,
        cache: snapshot,
        handled_by,
    })?;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        body.len(),
        body
    );
    write.write_all(response.as_bytes()).await?;
    Ok(())
}
