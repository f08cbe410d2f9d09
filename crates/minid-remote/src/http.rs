use crate::{
    CreateIdentifier, IdentifierRecord, LookupResponse, RegistryBackend, RemoteError,
    ServiceConfig, UpdateIdentifier,
};
use std::io::Read;

/// HTTP client for the identifier registry REST API.
///
/// Routes:
/// - `POST {base}/identifiers`                — mint a new identifier
/// - `GET  {base}/identifiers/{id}`           — fetch one record
/// - `GET  {base}/identifiers?checksum={hex}` — look up by checksum value
/// - `PUT  {base}/identifiers/{id}`           — update metadata/locations
///
/// Lookups work unauthenticated; minting and updates need a bearer token.
/// No retries and no timeouts beyond the agent defaults.
pub struct HttpRegistry {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

impl HttpRegistry {
    pub fn new(config: &ServiceConfig, auth_token: Option<String>) -> Self {
        Self {
            base_url: config.registry_url.trim_end_matches('/').to_owned(),
            auth_token,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn user_agent() -> String {
        format!("minid/{}", env!("CARGO_PKG_VERSION"))
    }

    fn do_get(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let mut req = self
            .agent
            .get(url)
            .header("User-Agent", &Self::user_agent());
        if let Some(ref token) = self.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(401 | 403)) => {
                return Err(RemoteError::Unauthorized);
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => {
                return Err(RemoteError::Http(e.to_string()));
            }
        };
        read_all(resp.into_body().into_reader())
    }

    fn do_send(
        &self,
        method: &str,
        url: &str,
        payload: &impl serde::Serialize,
    ) -> Result<Vec<u8>, RemoteError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        let mut req = if method == "PUT" {
            self.agent.put(url)
        } else {
            self.agent.post(url)
        };
        req = req
            .header("Content-Type", "application/json")
            .header("User-Agent", &Self::user_agent());
        if let Some(ref token) = self.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.send(&body[..]) {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(401 | 403)) => {
                return Err(RemoteError::Unauthorized);
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => {
                return Err(RemoteError::Http(e.to_string()));
            }
        };
        read_all(resp.into_body().into_reader())
    }
}

fn read_all(mut reader: impl Read) -> Result<Vec<u8>, RemoteError> {
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| RemoteError::Http(e.to_string()))?;
    Ok(body)
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(body).map_err(|e| RemoteError::Serialization(e.to_string()))
}

impl RegistryBackend for HttpRegistry {
    fn create_identifier(
        &self,
        request: &CreateIdentifier,
    ) -> Result<IdentifierRecord, RemoteError> {
        let url = format!("{}/identifiers", self.base_url);
        tracing::debug!("POST {url}");
        let body = self.do_send("POST", &url, request)?;
        parse_json(&body)
    }

    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord, RemoteError> {
        let url = format!("{}/identifiers/{identifier}", self.base_url);
        tracing::debug!("GET {url}");
        let body = match self.do_get(&url) {
            Err(RemoteError::NotFound(_)) => {
                return Err(RemoteError::NotFound(identifier.to_owned()));
            }
            other => other?,
        };
        parse_json(&body)
    }

    fn lookup_by_checksum(&self, value: &str) -> Result<Option<IdentifierRecord>, RemoteError> {
        let url = format!("{}/identifiers?checksum={value}", self.base_url);
        tracing::debug!("GET {url}");
        let body = match self.do_get(&url) {
            Ok(body) => body,
            Err(RemoteError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let parsed: LookupResponse = parse_json(&body)?;
        Ok(parsed.identifiers.into_iter().next())
    }

    fn update_identifier(
        &self,
        identifier: &str,
        request: &UpdateIdentifier,
    ) -> Result<IdentifierRecord, RemoteError> {
        let url = format!("{}/identifiers/{identifier}", self.base_url);
        tracing::debug!("PUT {url}");
        let body = self.do_send("PUT", &url, request)?;
        parse_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minid_schema::{ChecksumRecord, Minid};
    use std::collections::{BTreeMap, HashMap};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    /// A captured HTTP request for header and body inspection.
    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: String,
    }

    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
        responses: Arc<Mutex<HashMap<String, (u16, String)>>>,
    }

    impl MockServer {
        fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
            let responses: Arc<Mutex<HashMap<String, (u16, String)>>> =
                Arc::new(Mutex::new(HashMap::new()));

            let requests_clone = Arc::clone(&requests);
            let responses_clone = Arc::clone(&responses);
            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let reqs = Arc::clone(&requests_clone);
                    let resps = Arc::clone(&responses_clone);

                    std::thread::spawn(move || {
                        let mut reader = BufReader::new(stream.try_clone().unwrap());
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).is_err() {
                            return;
                        }
                        let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
                        if parts.len() < 2 {
                            return;
                        }
                        let method = parts[0].to_owned();
                        let path = parts[1].to_owned();

                        let mut content_length: usize = 0;
                        let mut headers = HashMap::new();
                        loop {
                            let mut line = String::new();
                            if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                                break;
                            }
                            if let Some((key, value)) = line.trim().split_once(": ") {
                                headers.insert(key.to_lowercase(), value.to_owned());
                            }
                            let lower = line.to_lowercase();
                            if let Some(value) = lower.strip_prefix("content-length: ") {
                                content_length = value.trim().parse().unwrap_or(0);
                            }
                        }

                        let mut body = vec![0u8; content_length];
                        if content_length > 0 {
                            let _ = reader.read_exact(&mut body);
                        }

                        reqs.lock().unwrap().push(CapturedRequest {
                            method,
                            path: path.clone(),
                            headers,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        });

                        let (status, payload) = resps
                            .lock()
                            .unwrap()
                            .get(&path)
                            .cloned()
                            .unwrap_or((404, "not found".to_owned()));
                        let reason = if status == 200 { "OK" } else { "Error" };
                        let response = format!(
                            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                            payload.len()
                        );
                        let _ = stream.write_all(response.as_bytes());
                        let _ = stream.flush();
                    });
                }
            });

            MockServer {
                addr,
                _handle: handle,
                requests,
                responses,
            }
        }

        fn stub(&self, path: &str, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_owned(), (status, body.to_owned()));
        }

        fn captured_requests(&self) -> Vec<CapturedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn test_config(url: &str) -> ServiceConfig {
        ServiceConfig::default().with_registry_url(url)
    }

    fn record_json(identifier: &str, checksum: &str) -> String {
        serde_json::to_string(&IdentifierRecord {
            identifier: Minid::new(identifier),
            checksums: vec![ChecksumRecord::new("sha256", checksum)],
            metadata: BTreeMap::new(),
            location: Vec::new(),
            namespace: "minid".to_owned(),
            visible_to: vec!["public".to_owned()],
            created: None,
            updated: None,
        })
        .unwrap()
    }

    fn create_request() -> CreateIdentifier {
        CreateIdentifier {
            checksums: vec![ChecksumRecord::new("sha256", "abc123")],
            metadata: BTreeMap::from([("erc.what".to_owned(), "foo.txt".to_owned())]),
            location: Vec::new(),
            namespace: "minid".to_owned(),
            visible_to: vec!["public".to_owned()],
        }
    }

    #[test]
    fn create_posts_json_with_auth_headers() {
        let server = MockServer::start();
        server.stub("/identifiers", 200, &record_json("minid:000001", "abc123"));
        let registry = HttpRegistry::new(&test_config(&server.addr), Some("tok-1".to_owned()));

        let record = registry.create_identifier(&create_request()).unwrap();
        assert_eq!(record.identifier, "minid:000001");

        std::thread::sleep(std::time::Duration::from_millis(50));
        let reqs = server.captured_requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(
            reqs[0].headers.get("authorization"),
            Some(&"Bearer tok-1".to_owned())
        );
        assert_eq!(
            reqs[0].headers.get("content-type"),
            Some(&"application/json".to_owned())
        );
        let ua = reqs[0].headers.get("user-agent").unwrap();
        assert!(ua.starts_with("minid/"), "unexpected user agent: {ua}");
        assert!(reqs[0].body.contains("\"sha256\""));
    }

    #[test]
    fn no_auth_header_without_token() {
        let server = MockServer::start();
        server.stub(
            "/identifiers?checksum=abc123",
            200,
            &format!(r#"{{"identifiers": [{}]}}"#, record_json("minid:000001", "abc123")),
        );
        let registry = HttpRegistry::new(&test_config(&server.addr), None);

        let found = registry.lookup_by_checksum("abc123").unwrap();
        assert_eq!(found.unwrap().identifier, "minid:000001");

        std::thread::sleep(std::time::Duration::from_millis(50));
        let reqs = server.captured_requests();
        assert!(!reqs[0].headers.contains_key("authorization"));
    }

    #[test]
    fn lookup_miss_is_none_not_error() {
        let server = MockServer::start();
        // 404 from the lookup route means "nothing registered".
        let registry = HttpRegistry::new(&test_config(&server.addr), None);
        assert!(registry.lookup_by_checksum("feed").unwrap().is_none());
    }

    #[test]
    fn lookup_empty_list_is_none() {
        let server = MockServer::start();
        server.stub("/identifiers?checksum=feed", 200, r#"{"identifiers": []}"#);
        let registry = HttpRegistry::new(&test_config(&server.addr), None);
        assert!(registry.lookup_by_checksum("feed").unwrap().is_none());
    }

    #[test]
    fn get_missing_identifier_is_not_found() {
        let server = MockServer::start();
        let registry = HttpRegistry::new(&test_config(&server.addr), None);
        let result = registry.get_identifier("minid:ffffff");
        assert!(matches!(result, Err(RemoteError::NotFound(id)) if id == "minid:ffffff"));
    }

    #[test]
    fn unauthorized_create_maps_to_unauthorized() {
        let server = MockServer::start();
        server.stub("/identifiers", 401, r#"{"error": "bad token"}"#);
        let registry = HttpRegistry::new(&test_config(&server.addr), Some("wrong".to_owned()));
        let result = registry.create_identifier(&create_request());
        assert!(matches!(result, Err(RemoteError::Unauthorized)));
    }

    #[test]
    fn update_puts_partial_payload() {
        let server = MockServer::start();
        server.stub(
            "/identifiers/minid:000001",
            200,
            &record_json("minid:000001", "abc123"),
        );
        let registry = HttpRegistry::new(&test_config(&server.addr), Some("tok-1".to_owned()));

        let update = UpdateIdentifier {
            metadata: Some(BTreeMap::from([(
                "erc.what".to_owned(),
                "renamed.txt".to_owned(),
            )])),
            location: None,
        };
        registry.update_identifier("minid:000001", &update).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        let reqs = server.captured_requests();
        assert_eq!(reqs[0].method, "PUT");
        assert!(reqs[0].body.contains("renamed.txt"));
        assert!(!reqs[0].body.contains("location"));
    }

    #[test]
    fn connection_refused_returns_http_error() {
        let registry = HttpRegistry::new(&test_config("http://127.0.0.1:1"), None);
        let result = registry.lookup_by_checksum("abc");
        assert!(matches!(result, Err(RemoteError::Http(_))));
    }
}
