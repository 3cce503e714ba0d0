use serde::Serialize;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::{LevelError, Result};

pub const API_KEY_HEADER: &str = "x-internal-api-key";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewLevel<'a> {
    new_level_id: &'a str,
}

/// Tells the worker that a level was stored so it can add the id to its
/// key-value index.
pub fn notify_worker(worker: &WorkerConfig, level_id: &str) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LevelError::Notify(e.to_string()))?;

    let response = client
        .post(&worker.url)
        .header(API_KEY_HEADER, &worker.api_key)
        .json(&NewLevel {
            new_level_id: level_id,
        })
        .send()
        .map_err(|e| LevelError::Notify(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(LevelError::Notify(format!(
            "{} answered {status}: {}",
            worker.url,
            body.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Accepts one HTTP request, answers with `status` and returns the raw
    /// request text from the join handle.
    fn serve_once(status: &'static str, reply: &'static str) -> (WorkerConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let worker = WorkerConfig {
            url: format!("http://{}/levels", listener.local_addr().unwrap()),
            api_key: "sek".to_string(),
        };
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    if request.len() >= end + 4 + content_length(&text[..end]) {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
                reply.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (worker, handle)
    }

    #[test]
    fn posts_the_level_id_with_the_api_key() {
        let (worker, server) = serve_once("200 OK", "ok");
        notify_worker(&worker, "abc").unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /levels "));
        assert!(request.to_ascii_lowercase().contains("x-internal-api-key: sek"));
        assert!(request.ends_with(r#"{"newLevelId":"abc"}"#));
    }

    #[test]
    fn error_status_is_a_notify_error() {
        let (worker, server) = serve_once("500 Internal Server Error", "no");
        let err = notify_worker(&worker, "abc").unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, LevelError::Notify(_)));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn body_uses_the_worker_field_name() {
        let body = serde_json::to_string(&NewLevel {
            new_level_id: "sunny_beach",
        })
        .unwrap();
        assert_eq!(body, r#"{"newLevelId":"sunny_beach"}"#);
    }

    #[test]
    fn unreachable_worker_is_a_notify_error() {
        let worker = WorkerConfig {
            url: "http://127.0.0.1:9/levels".to_string(),
            api_key: "k".to_string(),
        };
        assert!(matches!(
            notify_worker(&worker, "x"),
            Err(LevelError::Notify(_))
        ));
    }
}
