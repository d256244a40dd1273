//! IPC Client for communicating with the focusmind daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::AppPaths;
use crate::types::{IpcRequest, IpcResponse, SettingsPatch};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: usize = 65536;

/// Maximum connection attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for the daemon socket under `paths`.
    pub fn new(paths: &AppPaths) -> Self {
        Self::with_socket_path(paths.socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub async fn start(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Start).await
    }

    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Pause).await
    }

    pub async fn skip(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Skip).await
    }

    pub async fn cancel(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Cancel).await
    }

    pub async fn status(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Status).await
    }

    /// Submits a rating, or skips it with `None`.
    pub async fn feedback(&self, rating: Option<u8>) -> Result<IpcResponse> {
        self.send(&IpcRequest::Feedback { rating }).await
    }

    pub async fn settings(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Settings).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<IpcResponse> {
        self.send(&IpcRequest::UpdateSettings { patch }).await
    }

    pub async fn login(&self, user: &str) -> Result<IpcResponse> {
        self.send(&IpcRequest::Login {
            user: user.to_string(),
        })
        .await
    }

    pub async fn logout(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Logout).await
    }

    pub async fn suspend(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Suspend).await
    }

    pub async fn resume(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Resume).await
    }

    /// Sends a request and returns the daemon's response.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be reached, the exchange fails
    /// or the daemon answers with an error response.
    pub async fn send(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect_with_retry().await?;
        let response = self.exchange(&mut stream, request).await?;

        if !response.is_success() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Connects to the daemon, retrying with a linear back-off.
    ///
    /// Only the connection is retried so a request is never delivered twice.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::debug!("接続失敗 (試行 {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'focusmind daemon' を起動してください")
    }

    async fn exchange(&self, stream: &mut UnixStream, request: &IpcRequest) -> Result<IpcResponse> {
        let io_timeout = Duration::from_secs(IO_TIMEOUT_SECS);

        // Serialize request
        let request_json =
            serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;

        // Send request with timeout
        timeout(io_timeout, stream.write_all(&request_json))
            .await
            .context("書き込みがタイムアウトしました")?
            .context("リクエストの送信に失敗しました")?;

        // Shutdown write side to signal end of request
        timeout(io_timeout, stream.shutdown())
            .await
            .context("書き込みがタイムアウトしました")?
            .context("シャットダウンに失敗しました")?;

        // Read response with timeout
        let mut buffer = Vec::new();
        let mut limited = stream.take(MAX_RESPONSE_SIZE as u64 + 1);
        timeout(io_timeout, limited.read_to_end(&mut buffer))
            .await
            .context("読み込みがタイムアウトしました")?
            .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }
        if buffer.len() > MAX_RESPONSE_SIZE {
            anyhow::bail!("Daemonからの応答が大きすぎます");
        }

        serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")
    }
}

// ============================================================================
// Tests
// ============================================================================
