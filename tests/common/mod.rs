//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ssr_gateway::config::{
    BundleConfig, ListenerConfig, Mode, ObservabilityConfig, ServerConfig, UpstreamConfig,
};
use ssr_gateway::http::ShellRenderer;
use ssr_gateway::lifecycle::{launch, ServerHandle};

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Received> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Received {
        method,
        target,
        headers,
        body,
    })
}

/// Start a mock upstream that answers with `respond(request) -> (status line, extra headers, body)`.
pub async fn start_programmable_backend<F>(respond: F) -> SocketAddr
where
    F: Fn(&Received) -> (&'static str, Vec<(&'static str, String)>, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let respond = respond.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, headers, body) = respond(&request);
                        let mut response = format!("HTTP/1.1 {status}\r\n");
                        for (name, value) in headers {
                            response.push_str(&format!("{name}: {value}\r\n"));
                        }
                        response.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ));
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock upstream echoing the request it received as JSON.
///
/// The echo is labelled `text/plain` so tests can see the gateway relabel it.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|request| {
        let echo = serde_json::json!({
            "method": request.method,
            "target": request.target,
            "body": String::from_utf8_lossy(&request.body),
            "host": request.header("host"),
        });
        (
            "200 OK",
            vec![
                ("Content-Type", "text/plain".to_string()),
                ("X-Powered-By", "Express".to_string()),
            ],
            echo.to_string(),
        )
    })
    .await
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config rooted at `dir`, creating the bundle and public directories.
pub fn config(dir: &Path, upstream_port: u16, mode: Mode) -> ServerConfig {
    let client_dir = dir.join("build").join("client");
    let public_dir = dir.join("public");
    std::fs::create_dir_all(&client_dir).unwrap();
    std::fs::create_dir_all(&public_dir).unwrap();

    ServerConfig {
        listener: ListenerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        },
        upstream: UpstreamConfig {
            host: "127.0.0.1".to_string(),
            port: upstream_port,
            ..UpstreamConfig::default()
        },
        bundle: BundleConfig {
            http_path: "/client".to_string(),
            client_dir,
            cache_max_age: Duration::from_secs(60),
        },
        public_dir,
        mode,
        observability: ObservabilityConfig::default(),
    }
}

/// Launch a gateway with the default shell renderer.
pub async fn start_gateway(config: ServerConfig) -> ServerHandle {
    let renderer = Arc::new(ShellRenderer::from_bundle(&config.bundle));
    launch(config, renderer).await.unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.local_addr(), path)
}

/// Assert the four hardening headers plus service worker scope.
pub fn assert_hardened(response: &reqwest::Response) {
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-download-options"], "noopen");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["service-worker-allowed"], "/");
    assert!(!headers.contains_key("x-powered-by"));
}
