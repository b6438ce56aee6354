// src/testing.rs
//! Test doubles shared by the unit tests

use crate::gps::serial::{Connector, DeviceConfig};
use reqwest::Url;
use std::{collections::VecDeque, io, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_test::io::Mock;

/// Hands out scripted connection results in order, then reports no device
pub struct ScriptedConnector {
    script: VecDeque<io::Result<Mock>>,
    pub attempts: usize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<io::Result<Mock>>) -> Self {
        Self {
            script: script.into(),
            attempts: 0,
        }
    }
}

impl Connector for ScriptedConnector {
    type Stream = Mock;

    fn connect(&mut self, _config: &DeviceConfig) -> io::Result<Mock> {
        self.attempts += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::NotFound, "no device")))
    }
}

pub fn device_config() -> DeviceConfig {
    DeviceConfig {
        path: "/dev/ttyTEST".to_string(),
        read_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_secs(5),
        ..DeviceConfig::default()
    }
}

/// Serve one canned status per connection, returning every request received
pub async fn serve(statuses: Vec<u16>) -> (Url, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/gps", listener.local_addr().unwrap())).unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for status in statuses {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);
            let response = format!(
                "HTTP/1.1 {} Canned\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
        requests
    });

    (url, handle)
}

/// URL of a local port with nothing listening on it
pub async fn refused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}/gps", addr)).unwrap()
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    l.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().to_string())
                })
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

/// JSON body of a captured request
pub fn body(request: &str) -> serde_json::Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}
