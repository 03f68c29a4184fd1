//! HTTP PUT media upload client.
//!
//! Streams recorded clips to the media server with a hand-rolled HTTP/1.1
//! PUT over a [`TcpStream`]: the firmware-class server on the other end
//! speaks just enough HTTP for object storage, so no client stack is needed.
//! Uses `Expect: 100-continue` so an unauthorized or full server can reject
//! the transfer before the body is sent.
//!
//! One transfer at a time: the single-flight guard is a field of the client,
//! released on every exit path.

use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use latchkey_core::constants::{
    UPLOAD_CHUNK_SIZE, UPLOAD_HANDSHAKE_TIMEOUT_MS, UPLOAD_MAX_WRITE_RETRIES,
    UPLOAD_RESPONSE_TIMEOUT_MS, UPLOAD_TIMEOUT_MS,
};
use latchkey_core::{Error, Result};
use latchkey_events::MediaUploader;

/// Media server endpoint.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub host: String,
    pub port: u16,
    /// Bucket path prefix, with surrounding slashes: `/recordings/`.
    pub bucket: String,
}

/// Single-flight HTTP PUT uploader.
#[derive(Debug)]
pub struct UploadClient {
    config: UploadConfig,
    in_flight: bool,
    last_url: Option<String>,
}

impl UploadClient {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            in_flight: false,
            last_url: None,
        }
    }

    /// URL of the most recently completed upload.
    pub fn last_uploaded_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    /// Upload `path` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while another transfer is in flight and
    /// [`Error::UploadFailed`] when the server rejects the transfer, the
    /// response is not 200/201, or the overall deadline expires.
    pub async fn upload_file(&mut self, path: &Path) -> Result<String> {
        if self.in_flight {
            return Err(Error::Busy("upload in progress".into()));
        }
        self.in_flight = true;

        let result = match timeout(
            Duration::from_millis(UPLOAD_TIMEOUT_MS),
            transfer(&self.config, path),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::UploadFailed("overall deadline exceeded".into())),
        };

        self.in_flight = false;
        if let Ok(url) = &result {
            info!(path = %path.display(), url, "upload complete");
            self.last_url = Some(url.clone());
        }
        result
    }
}

impl MediaUploader for UploadClient {
    async fn upload_file(&mut self, path: &Path) -> Result<String> {
        UploadClient::upload_file(self, path).await
    }
}

async fn transfer(config: &UploadConfig, path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidValue(format!("not a file path: {}", path.display())))?
        .to_string_lossy()
        .into_owned();
    let target = format!("{}{}", config.bucket, file_name);

    let mut file = File::open(path).await?;
    let content_length = file.metadata().await?.len();

    let mut stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
    debug!(%target, content_length, "upload connection established");

    let head = format!(
        "PUT {target} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {content_length}\r\n\
         Expect: 100-continue\r\n\
         Connection: close\r\n\r\n",
        config.host, config.port
    );
    stream.write_all(head.as_bytes()).await?;

    await_continue(&mut stream).await?;
    send_body(&mut stream, &mut file).await?;
    stream.flush().await?;

    let status = read_status(&mut stream).await?;
    let _ = stream.shutdown().await;

    match status {
        200 | 201 => Ok(format!(
            "http://{}:{}{target}",
            config.host, config.port
        )),
        code => Err(Error::UploadFailed(format!(
            "server responded with status {code}"
        ))),
    }
}

/// Wait briefly for the server's verdict on the request head.
///
/// A 100 Continue or a silent server both mean proceed; an error status
/// aborts before any body byte is sent.
async fn await_continue(stream: &mut TcpStream) -> Result<()> {
    let mut buf = [0u8; 256];
    match timeout(
        Duration::from_millis(UPLOAD_HANDSHAKE_TIMEOUT_MS),
        stream.read(&mut buf),
    )
    .await
    {
        Err(_) => Ok(()),
        Ok(Ok(0)) => Err(Error::UploadFailed(
            "connection closed during handshake".into(),
        )),
        Ok(Ok(n)) => {
            let head = String::from_utf8_lossy(&buf[..n]);
            match parse_status(&head) {
                Some(code) if code >= 400 => Err(Error::UploadFailed(format!(
                    "server rejected transfer with status {code}"
                ))),
                _ => Ok(()),
            }
        }
        Ok(Err(err)) => Err(err.into()),
    }
}

async fn send_body(stream: &mut TcpStream, file: &mut File) -> Result<()> {
    let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        write_chunk(stream, &chunk[..n]).await?;
    }
}

async fn write_chunk(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=UPLOAD_MAX_WRITE_RETRIES {
        match stream.write_all(data).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(attempt, error = %err, "chunk write failed");
                last_err = Some(err);
            }
        }
    }
    Err(Error::UploadFailed(format!(
        "chunk write failed after {UPLOAD_MAX_WRITE_RETRIES} attempts: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Read the final response head and return its status code.
async fn read_status(stream: &mut TcpStream) -> Result<u16> {
    let mut head = Vec::new();
    let mut buf = [0u8; 256];

    let deadline = Duration::from_millis(UPLOAD_RESPONSE_TIMEOUT_MS);
    let result = timeout(deadline, async {
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    })
    .await;

    match result {
        Err(_) => return Err(Error::UploadFailed("response timed out".into())),
        Ok(Err(err)) => return Err(err.into()),
        Ok(Ok(())) => {}
    }

    let text = String::from_utf8_lossy(&head);
    // A 100 Continue that arrived after the handshake window is skipped
    for line in text.split("\r\n") {
        if let Some(code) = parse_status(line) {
            if code != 100 {
                return Ok(code);
            }
        }
    }
    Err(Error::UploadFailed("malformed response head".into()))
}

fn parse_status(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn client(port: u16) -> UploadClient {
        UploadClient::new(UploadConfig {
            host: "127.0.0.1".into(),
            port,
            bucket: "/recordings/".into(),
        })
    }

    fn clip_file(bytes: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("VIDEO_")
            .suffix(".mp4")
            .tempfile()
            .unwrap();
        file.write_all(&vec![0xABu8; bytes]).unwrap();
        file
    }

    /// Minimal object-store endpoint: 100-continue handshake, then reads
    /// the body and answers with the given status line.
    async fn serve_one(listener: TcpListener, status: &'static str) -> (String, usize) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.unwrap();

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if let Some(value) = line.strip_prefix("Content-Length: ") {
                content_length = value.trim().parse().unwrap();
            }
            if line == "\r\n" {
                break;
            }
        }

        reader
            .get_mut()
            .write_all(b"HTTP/1.1 100 Continue\r\n\r\n")
            .await
            .unwrap();

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.unwrap();
        reader
            .get_mut()
            .write_all(format!("{status}\r\n\r\n").as_bytes())
            .await
            .unwrap();

        (request_line, body.len())
    }

    #[tokio::test]
    async fn upload_streams_file_and_caches_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_one(listener, "HTTP/1.1 201 Created"));

        let clip = clip_file(3_000);
        let name = clip.path().file_name().unwrap().to_string_lossy().into_owned();
        let mut client = client(port);

        let url = client.upload_file(clip.path()).await.unwrap();
        assert_eq!(url, format!("http://127.0.0.1:{port}/recordings/{name}"));
        assert_eq!(client.last_uploaded_url(), Some(url.as_str()));

        let (request_line, body_len) = server.await.unwrap();
        assert!(request_line.starts_with(&format!("PUT /recordings/{name} HTTP/1.1")));
        assert_eq!(body_len, 3_000);
    }

    #[tokio::test]
    async fn early_rejection_aborts_before_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            stream
                .write_all(b"HTTP/1.1 403 Forbidden\r\n\r\n")
                .await
                .unwrap();
        });

        let clip = clip_file(100);
        let mut client = client(port);
        let err = client.upload_file(clip.path()).await.unwrap_err();
        assert!(matches!(err, Error::UploadFailed(_)));
        assert!(client.last_uploaded_url().is_none());
    }

    #[tokio::test]
    async fn failed_upload_releases_single_flight_guard() {
        // Nothing listening: connect fails fast
        let clip = clip_file(100);
        let dead_port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut client = client(dead_port);
        assert!(client.upload_file(clip.path()).await.is_err());

        // Guard released: a follow-up transfer proceeds
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_one(listener, "HTTP/1.1 200 OK"));
        client.config.port = port;
        assert!(client.upload_file(clip.path()).await.is_ok());
    }
}
