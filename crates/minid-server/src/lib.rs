//! Reference identifier registry server.
//!
//! Implements the registry routes the [`minid_remote::HttpRegistry`] client
//! speaks, plus a static token endpoint for exercising the login flow.
//! Storage is file-backed: the full record list lives at
//! `{data_dir}/identifiers.json` with an in-memory `RwLock` cache.
//!
//! The [`TestServer`] helper starts a server on a random port for
//! integration testing.

use chrono::Utc;
use minid_remote::{CreateIdentifier, IdentifierRecord, LookupResponse, UpdateIdentifier};
use minid_schema::Minid;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info};

/// In-memory + file-backed identifier store.
pub struct RegistryStore {
    data_dir: PathBuf,
    /// Cache of all records (kept in memory for atomic read-modify-write).
    records: RwLock<Vec<IdentifierRecord>>,
}

impl RegistryStore {
    pub fn new(data_dir: PathBuf) -> Self {
        let path = data_dir.join("identifiers.json");
        let records = if path.exists() {
            fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            data_dir,
            records: RwLock::new(records),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn persist(&self, records: &[IdentifierRecord]) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(self.data_dir.join("identifiers.json"), content)
    }

    /// Mint a new identifier in the requested namespace.
    pub fn create(&self, request: &CreateIdentifier) -> std::io::Result<IdentifierRecord> {
        let mut records = self.records.write().expect("store lock poisoned");
        let seq = records.len() + 1;
        let now = Utc::now();
        let record = IdentifierRecord {
            identifier: Minid::new(format!("{}:{seq:06x}", request.namespace)),
            checksums: request.checksums.clone(),
            metadata: request.metadata.clone(),
            location: request.location.clone(),
            namespace: request.namespace.clone(),
            visible_to: request.visible_to.clone(),
            created: Some(now),
            updated: Some(now),
        };
        records.push(record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    pub fn get(&self, identifier: &str) -> Option<IdentifierRecord> {
        let records = self.records.read().expect("store lock poisoned");
        records
            .iter()
            .find(|r| r.identifier == *identifier)
            .cloned()
    }

    pub fn find_by_checksum(&self, value: &str) -> Option<IdentifierRecord> {
        let records = self.records.read().expect("store lock poisoned");
        records
            .iter()
            .find(|r| r.checksums.iter().any(|c| c.value == value))
            .cloned()
    }

    /// Apply a partial update; `None` fields keep the stored value.
    pub fn update(
        &self,
        identifier: &str,
        request: &UpdateIdentifier,
    ) -> std::io::Result<Option<IdentifierRecord>> {
        let mut records = self.records.write().expect("store lock poisoned");
        let Some(record) = records.iter_mut().find(|r| r.identifier == *identifier) else {
            return Ok(None);
        };
        if let Some(ref metadata) = request.metadata {
            record.metadata = metadata.clone();
        }
        if let Some(ref location) = request.location {
            record.location = location.clone();
        }
        record.updated = Some(Utc::now());
        let updated = record.clone();
        self.persist(&records)?;
        Ok(Some(updated))
    }
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let body = format!(r#"{{"error": "{msg}"}}"#);
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(
        Response::from_string(body)
            .with_header(header)
            .with_status_code(StatusCode(code)),
    );
}

fn respond_json(req: tiny_http::Request, json: impl Into<Vec<u8>>) {
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(Response::from_data(json.into()).with_header(header));
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

/// Check the bearer token on a mutating route. No configured token means
/// the server runs open.
fn authorized(req: &tiny_http::Request, auth_token: Option<&str>) -> bool {
    let Some(expected) = auth_token else {
        return true;
    };
    req.headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .is_some_and(|h| h.value.as_str() == format!("Bearer {expected}"))
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

fn handle_create(store: &RegistryStore, mut req: tiny_http::Request) {
    let Some(body) = read_body(&mut req) else {
        respond_err(req, 500, "read error");
        return;
    };
    let request: CreateIdentifier = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            respond_err(req, 400, &format!("invalid create payload: {e}"));
            return;
        }
    };
    match store.create(&request) {
        Ok(record) => {
            info!("minted {}", record.identifier);
            match serde_json::to_vec(&record) {
                Ok(json) => respond_json(req, json),
                Err(e) => respond_err(req, 500, &format!("serialize error: {e}")),
            }
        }
        Err(e) => {
            error!("create failed: {e}");
            respond_err(req, 500, &format!("write error: {e}"));
        }
    }
}

fn handle_update(store: &RegistryStore, mut req: tiny_http::Request, identifier: &str) {
    let Some(body) = read_body(&mut req) else {
        respond_err(req, 500, "read error");
        return;
    };
    let request: UpdateIdentifier = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            respond_err(req, 400, &format!("invalid update payload: {e}"));
            return;
        }
    };
    match store.update(identifier, &request) {
        Ok(Some(record)) => match serde_json::to_vec(&record) {
            Ok(json) => respond_json(req, json),
            Err(e) => respond_err(req, 500, &format!("serialize error: {e}")),
        },
        Ok(None) => respond_err(req, 404, "not found"),
        Err(e) => {
            error!("update failed: {e}");
            respond_err(req, 500, &format!("write error: {e}"));
        }
    }
}

/// Static token exchange: every grant yields the configured token.
fn handle_token(req: tiny_http::Request, auth_token: Option<&str>) {
    let token = auth_token.unwrap_or("minid-test-token");
    let body = format!(
        r#"{{"access_token": "{token}", "refresh_token": "{token}-refresh", "expires_in": 172800}}"#
    );
    respond_json(req, body.into_bytes());
}

/// Handle a single HTTP request, dispatching to the appropriate route.
pub fn handle_request(store: &RegistryStore, auth_token: Option<&str>, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));

    if path == "/health" && method == Method::Get {
        respond_json(req, r#"{"status": "ok"}"#.as_bytes().to_vec());
    } else if path == "/token" && method == Method::Post {
        handle_token(req, auth_token);
    } else if path == "/revoke" && method == Method::Post {
        respond_json(req, r#"{"revoked": true}"#.as_bytes().to_vec());
    } else if path == "/identifiers" {
        match method {
            Method::Post => {
                if !authorized(&req, auth_token) {
                    respond_err(req, 401, "unauthorized");
                    return;
                }
                handle_create(store, req);
            }
            Method::Get => {
                let Some(value) = query_param(query, "checksum") else {
                    respond_err(req, 400, "missing checksum parameter");
                    return;
                };
                let identifiers: Vec<IdentifierRecord> =
                    store.find_by_checksum(value).into_iter().collect();
                match serde_json::to_vec(&LookupResponse { identifiers }) {
                    Ok(json) => respond_json(req, json),
                    Err(e) => respond_err(req, 500, &format!("serialize error: {e}")),
                }
            }
            _ => respond_err(req, 405, "method not allowed"),
        }
    } else if let Some(identifier) = path.strip_prefix("/identifiers/") {
        match method {
            Method::Get => match store.get(identifier) {
                Some(record) => match serde_json::to_vec(&record) {
                    Ok(json) => respond_json(req, json),
                    Err(e) => respond_err(req, 500, &format!("serialize error: {e}")),
                },
                None => respond_err(req, 404, "not found"),
            },
            Method::Put => {
                if !authorized(&req, auth_token) {
                    respond_err(req, 401, "unauthorized");
                    return;
                }
                handle_update(store, req, identifier);
            }
            _ => respond_err(req, 405, "method not allowed"),
        }
    } else {
        respond_err(req, 404, "not found");
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(store: &Arc<RegistryStore>, addr: &str, auth_token: Option<&str>) {
    let server = Server::http(addr).expect("failed to bind HTTP server");
    for request in server.incoming_requests() {
        handle_request(store, auth_token, request);
    }
}

/// A test helper that starts a registry server on a random port in a
/// background thread.
///
/// The server listens on `127.0.0.1:{port}` and stores records in the
/// provided `data_dir`.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub data_dir: PathBuf,
    _server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Start an open test server (no bearer auth) with the given data
    /// directory. Binds to `127.0.0.1:0` (random port).
    pub fn start(data_dir: PathBuf) -> Self {
        Self::spawn(data_dir, None)
    }

    /// Start a test server that requires `Bearer {token}` on mutating routes.
    pub fn start_with_token(data_dir: PathBuf, token: &str) -> Self {
        Self::spawn(data_dir, Some(token.to_owned()))
    }

    fn spawn(data_dir: PathBuf, token: Option<String>) -> Self {
        fs::create_dir_all(&data_dir).expect("failed to create test data dir");
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let store = Arc::new(RegistryStore::new(data_dir.clone()));
        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&store, token.as_deref(), request);
            }
        });

        Self {
            url,
            port,
            data_dir,
            _server: server,
            _handle: handle,
        }
    }
}
