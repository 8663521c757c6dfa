//! Upstream AIS feed connection.
//!
//! The core only depends on the [`AisFeed`] trait; [`TcpFeed`] is the
//! line-based TCP driver used in production. A background reader task
//! buffers incoming sentences into a bounded channel, and the poll
//! ticker drains whatever has accumulated since the last tick.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::FeedConfig;
use crate::errors::AisPluginError;

/// Sentences buffered between polls before the reader backpressures.
const SENTENCE_BUFFER: usize = 8192;

/// Connection to the upstream AIS sentence feed.
#[async_trait]
pub trait AisFeed: Send + Sync {
    /// Open the connection with the configured host, port and
    /// credentials.
    async fn open(&mut self, config: &FeedConfig) -> Result<(), AisPluginError>;

    fn is_open(&self) -> bool;

    /// Drain everything buffered since the previous call.
    fn take_sentences(&mut self) -> Vec<String>;

    async fn close(&mut self);
}

/// Line-based TCP feed driver.
pub struct TcpFeed {
    reader: Option<JoinHandle<()>>,
    rx: Option<mpsc::Receiver<String>>,
}

impl TcpFeed {
    pub fn new() -> Self {
        Self {
            reader: None,
            rx: None,
        }
    }
}

impl Default for TcpFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AisFeed for TcpFeed {
    async fn open(&mut self, config: &FeedConfig) -> Result<(), AisPluginError> {
        let mut stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| AisPluginError::FeedConnectionError(e.to_string()))?;

        if !config.username.is_empty() {
            let login = format!("{} {}\r\n", config.username, config.password);
            stream
                .write_all(login.as_bytes())
                .await
                .map_err(|e| AisPluginError::FeedConnectionError(e.to_string()))?;
        }

        let (tx, rx) = mpsc::channel(SENTENCE_BUFFER);
        self.reader = Some(tokio::spawn(read_sentences(stream, tx)));
        self.rx = Some(rx);
        info!("Connected to AIS feed at {}:{}", config.host, config.port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn take_sentences(&mut self) -> Vec<String> {
        let mut sentences = Vec::new();
        if let Some(rx) = self.rx.as_mut() {
            while let Ok(sentence) = rx.try_recv() {
                sentences.push(sentence);
            }
        }
        sentences
    }

    async fn close(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        self.rx = None;
    }
}

/// Read CRLF-separated sentences until the connection drops.
async fn read_sentences(stream: TcpStream, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let sentence = line.trim();
                if sentence.is_empty() {
                    continue;
                }
                if tx.send(sentence.to_string()).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!("AIS feed closed the connection");
                break;
            }
            Err(e) => {
                error!("AIS feed read error: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn config(port: u16) -> FeedConfig {
        FeedConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port,
            username: "observer".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn open_sends_login_and_buffers_sentences() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut login = vec![0u8; "observer secret\r\n".len()];
            socket.read_exact(&mut login).await.unwrap();
            socket
                .write_all(b"15RTgt0PAso;90TKcjM8h6g208CQ,0*4A\r\n\r\n!second\r\n")
                .await
                .unwrap();
            // hold the connection open until the client hangs up
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
            login
        });

        let mut feed = TcpFeed::new();
        feed.open(&config(port)).await.unwrap();
        assert!(feed.is_open());

        // give the reader task a moment to buffer the lines
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let sentences = feed.take_sentences();
        assert_eq!(
            sentences,
            vec![
                "15RTgt0PAso;90TKcjM8h6g208CQ,0*4A".to_string(),
                "!second".to_string()
            ]
        );

        feed.close().await;
        assert!(!feed.is_open());

        let login = server.await.unwrap();
        assert_eq!(login, b"observer secret\r\n");
    }

    #[tokio::test]
    async fn open_fails_when_nothing_listens() {
        let mut feed = TcpFeed::new();
        let result = feed.open(&config(1)).await;
        assert!(result.is_err());
        assert!(!feed.is_open());
    }
}
