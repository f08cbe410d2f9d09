//! Login service REST client and the local redirect listener for the
//! native-app login flow. The token-exchange protocol itself lives on the
//! server side; this client only calls its endpoints and hands the resulting
//! opaque tokens to the [`TokenStore`](crate::TokenStore).

use crate::tokens::{AuthError, TokenSet};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// Response body of the login service's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Client for the federated login service.
///
/// Routes:
/// - `GET  {auth}/authorize` — browser-visited authorization page
/// - `POST {auth}/token`     — code/refresh-token exchange (form-encoded)
/// - `POST {auth}/revoke`    — token revocation
pub struct AuthClient {
    auth_url: String,
    client_id: String,
    agent: ureq::Agent,
}

impl AuthClient {
    pub fn new(auth_url: &str, client_id: &str) -> Self {
        Self {
            auth_url: auth_url.trim_end_matches('/').to_owned(),
            client_id: client_id.to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// URL the user visits to authorize this client.
    pub fn authorize_url(&self, redirect_uri: &str, request_refresh: bool) -> String {
        let access_type = if request_refresh { "offline" } else { "online" };
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&access_type={}",
            self.auth_url, self.client_id, redirect_uri, access_type
        )
    }

    /// Exchange an authorization code for tokens.
    pub fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AuthError> {
        let url = format!("{}/token", self.auth_url);
        debug!("POST {url} (authorization_code)");
        let resp = self
            .agent
            .post(&url)
            .send_form([
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
            ])
            .map_err(|e| AuthError::Http(e.to_string()))?;
        parse_token_response(resp.into_body().into_reader())
    }

    /// Renew an expired access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let url = format!("{}/token", self.auth_url);
        debug!("POST {url} (refresh_token)");
        let resp = self
            .agent
            .post(&url)
            .send_form([
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ])
            .map_err(|e| AuthError::Http(e.to_string()))?;
        let mut tokens = parse_token_response(resp.into_body().into_reader())?;
        // The service may omit the refresh token on renewal; keep the old one.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(tokens)
    }

    /// Revoke one token. Callers treat failures as best effort.
    pub fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let url = format!("{}/revoke", self.auth_url);
        debug!("POST {url}");
        self.agent
            .post(&url)
            .send_form([("token", token), ("client_id", self.client_id.as_str())])
            .map_err(|e| AuthError::Http(e.to_string()))?;
        Ok(())
    }
}

fn parse_token_response(mut reader: impl Read) -> Result<TokenSet, AuthError> {
    let mut body = String::new();
    reader
        .read_to_string(&mut body)
        .map_err(|e| AuthError::Http(e.to_string()))?;
    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| AuthError::Serialization(e.to_string()))?;
    Ok(TokenSet {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at: parsed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    })
}

/// One-shot local redirect listener for the native-app login flow.
///
/// Binds `127.0.0.1:{port}`, waits for the login service to redirect the
/// browser back with `?code=...`, answers with a close-this-window page, and
/// returns the code.
pub fn receive_auth_code(port: u16) -> Result<String, AuthError> {
    let server = tiny_http::Server::http(format!("127.0.0.1:{port}"))
        .map_err(|e| AuthError::Flow(format!("failed to bind 127.0.0.1:{port}: {e}")))?;
    debug!("waiting for login redirect on 127.0.0.1:{port}");
    loop {
        let request = server.recv()?;
        let url = request.url().to_owned();
        let Some((_, query)) = url.split_once('?') else {
            let _ = request.respond(
                tiny_http::Response::from_string("waiting for login redirect")
                    .with_status_code(404),
            );
            continue;
        };
        if let Some(error) = query_param(query, "error") {
            let _ = request.respond(html_page("Login failed. You can close this window."));
            return Err(AuthError::Flow(format!(
                "login service returned error: {error}"
            )));
        }
        if let Some(code) = query_param(query, "code") {
            let _ = request.respond(html_page("Login complete. You can close this window."));
            return Ok(code);
        }
        let _ = request
            .respond(tiny_http::Response::from_string("missing code").with_status_code(400));
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

fn html_page(message: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header =
        tiny_http::Header::from_bytes("Content-Type", "text/html").expect("valid header");
    tiny_http::Response::from_string(format!("<html><body><p>{message}</p></body></html>"))
        .with_header(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};

    /// Minimal token endpoint: answers every POST with a canned JSON body and
    /// captures the form-encoded request body.
    fn start_token_endpoint(
        response: &'static str,
    ) -> (String, std::sync::mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                        break;
                    }
                    if let Some(value) = line.to_lowercase().strip_prefix("content-length: ") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
                let mut body = vec![0u8; content_length];
                let _ = reader.read_exact(&mut body);
                let _ = tx.send(String::from_utf8_lossy(&body).into_owned());
                let _ = stream.write_all(
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        response.len(),
                        response
                    )
                    .as_bytes(),
                );
                let _ = stream.flush();
            }
        });
        (addr, rx)
    }

    #[test]
    fn exchange_code_sends_grant_and_parses_tokens() {
        let (addr, body_rx) = start_token_endpoint(
            r#"{"access_token": "at-1", "refresh_token": "rt-1", "expires_in": 3600}"#,
        );
        let auth = AuthClient::new(&addr, "client-abc");
        let tokens = auth
            .exchange_code("code-xyz", "http://127.0.0.1:8642/callback")
            .unwrap();

        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
        assert!(tokens.expires_at.is_some());
        assert!(!tokens.is_expired());

        let body = body_rx.recv().unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=code-xyz"));
        assert!(body.contains("client_id=client-abc"));
    }

    #[test]
    fn refresh_keeps_old_refresh_token_when_omitted() {
        let (addr, body_rx) =
            start_token_endpoint(r#"{"access_token": "at-2", "expires_in": 3600}"#);
        let auth = AuthClient::new(&addr, "client-abc");
        let tokens = auth.refresh("rt-old").unwrap();
        assert_eq!(tokens.access_token, "at-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-old"));
        assert!(body_rx.recv().unwrap().contains("grant_type=refresh_token"));
    }

    #[test]
    fn exchange_code_http_error_surfaces() {
        let auth = AuthClient::new("http://127.0.0.1:1", "client-abc");
        let result = auth.exchange_code("code", "http://127.0.0.1:8642/callback");
        assert!(matches!(result, Err(AuthError::Http(_))));
    }

    #[test]
    fn authorize_url_carries_client_and_redirect() {
        let auth = AuthClient::new("https://auth.example.org/v2/oauth2/", "client-abc");
        let url = auth.authorize_url("http://127.0.0.1:8642/callback", true);
        assert!(url.starts_with("https://auth.example.org/v2/oauth2/authorize?"));
        assert!(url.contains("client_id=client-abc"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn receive_auth_code_returns_redirect_code() {
        // Grab a free port, release it, then listen on it.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let browser = std::thread::spawn(move || {
            // Retry briefly until the listener is up.
            for _ in 0..50 {
                if let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)) {
                    let _ = stream.write_all(
                        b"GET /callback?code=abc123&state=s HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                    );
                    let mut out = Vec::new();
                    let _ = stream.read_to_end(&mut out);
                    return;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        });

        let code = receive_auth_code(port).unwrap();
        assert_eq!(code, "abc123");
        browser.join().unwrap();
    }

    #[test]
    fn query_param_parses_pairs() {
        assert_eq!(
            query_param("code=xyz&state=1", "code").as_deref(),
            Some("xyz")
        );
        assert_eq!(query_param("state=1", "code"), None);
    }
}
