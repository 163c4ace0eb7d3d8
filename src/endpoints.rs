//! Endpoint server for exposing metrics and health checks

use crate::metrics::metrics;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start the endpoint server on `0.0.0.0:port`
pub async fn endpoint_server(port: u16) -> io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Metrics endpoint listening on {}", addr);
    serve(listener).await
}

/// Serve `/metrics` and `/health` on an already bound listener
pub async fn serve(listener: TcpListener) -> io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, _)) => {
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket).await {
                        tracing::debug!("Endpoint connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream) -> io::Result<()> {
    let mut buf = [0; 1024];
    let n = socket.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let response = match request_path(&request) {
        Some("/metrics") => match metrics().render() {
            Ok(body) => response("200 OK", "text/plain; version=0.0.4", &body),
            Err(e) => {
                tracing::error!("Failed to render metrics: {}", e);
                response("500 Internal Server Error", "text/plain", "metrics unavailable")
            }
        },
        Some("/health") => response("200 OK", "text/plain", "ok"),
        _ => response("404 Not Found", "text/plain", "not found"),
    };

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// Path of a `GET` request line, without query string
fn request_path(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    parts.next()?.split('?').next()
}

fn response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("GET /metrics HTTP/1.1\r\nHost: x\r\n\r\n"), Some("/metrics"));
        assert_eq!(request_path("GET /health?probe=1 HTTP/1.1\r\n"), Some("/health"));
        assert_eq!(request_path("POST /metrics HTTP/1.1\r\n"), None);
        assert_eq!(request_path(""), None);
    }

    #[tokio::test]
    async fn test_health_and_metrics_served() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        metrics().relayer_selections_total.inc();

        for (path, expected) in [("/health", "ok"), ("/metrics", "relayer_selections_total")] {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes())
                .await
                .unwrap();
            let mut body = String::new();
            stream.read_to_string(&mut body).await.unwrap();
            assert!(body.starts_with("HTTP/1.1 200 OK"), "{}", body);
            assert!(body.contains(expected), "{} missing {}", path, expected);
        }
    }
}
