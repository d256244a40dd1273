//! IPC server for the focus timer daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - One JSON request and one JSON response per connection
//! - Request handling on top of the shared `TimerEngine`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::config::AppPaths;
use crate::settings::{
    clear_auth, save_auth, validate_user_name, AuthRecord, FileSettingsProvider,
};
use crate::types::{IpcRequest, IpcResponse, ResponseData, SettingsPatch, TimerView};

use super::timer::{ResumeOutcome, TimerEngine, TransitionOutcome};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// The client closed the connection without sending anything
    #[error("Connection closed by client")]
    EmptyRequest,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client closes its write half, with a read timeout
    /// and a size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(1024);
        let mut limited = stream.take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            return Err(IpcError::EmptyRequest.into());
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest =
            serde_json::from_slice(&buffer).with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;
        stream
            .shutdown()
            .await
            .context("Failed to close response stream")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Serves one connection: reads a request, handles it, writes the response.
pub async fn serve_connection(handler: &RequestHandler, mut stream: UnixStream) {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => {
            debug!("IPC request: {:?}", request);
            handler.handle(request).await
        }
        Err(e) => {
            warn!("Invalid IPC request: {:#}", e);
            IpcResponse::error(format!("不正なリクエストです: {}", e))
        }
    };

    if let Err(e) = IpcServer::send_response(&mut stream, &response).await {
        warn!("Failed to send IPC response: {:#}", e);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to TimerEngine.
///
/// Locks are always taken engine first, then the settings provider.
pub struct RequestHandler {
    /// Shared reference to the timer engine
    engine: Arc<Mutex<TimerEngine>>,
    paths: AppPaths,
    /// Settings of the signed-in user
    provider: Mutex<Option<FileSettingsProvider>>,
}

impl RequestHandler {
    /// Creates a new request handler with the given timer engine.
    pub fn new(engine: Arc<Mutex<TimerEngine>>, paths: AppPaths) -> Self {
        Self {
            engine,
            paths,
            provider: Mutex::new(None),
        }
    }

    /// Signs in a user remembered from a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored user name is invalid.
    pub async fn restore_user(&self, user: &str) -> Result<()> {
        validate_user_name(user)?;
        let mut engine = self.engine.lock().await;
        let mut provider = FileSettingsProvider::load(self.paths.settings_path(user));
        let _ = engine.sign_in(user, &mut provider);
        *self.provider.lock().await = Some(provider);
        Ok(())
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Start => {
                self.transition("タイマーを開始しました", |e| e.start())
                    .await
            }
            IpcRequest::Pause => {
                self.transition("タイマーを一時停止しました", |e| e.pause())
                    .await
            }
            IpcRequest::Skip => {
                self.transition("セッションをスキップしました", |e| e.skip())
                    .await
            }
            IpcRequest::Cancel => {
                self.transition("セッションをキャンセルしました", |e| e.cancel())
                    .await
            }
            IpcRequest::Status => self.handle_status().await,
            IpcRequest::Feedback { rating } => self.handle_feedback(rating).await,
            IpcRequest::Settings => self.handle_settings().await,
            IpcRequest::UpdateSettings { patch } => self.handle_update_settings(patch).await,
            IpcRequest::Login { user } => self.handle_login(user).await,
            IpcRequest::Logout => self.handle_logout().await,
            IpcRequest::Suspend => {
                self.transition("セッションの状態を保存しました", |e| e.suspend())
                    .await
            }
            IpcRequest::Resume => self.handle_resume().await,
        }
    }

    async fn transition<F>(&self, message: &str, f: F) -> IpcResponse
    where
        F: FnOnce(&mut TimerEngine) -> TransitionOutcome,
    {
        let mut engine = self.engine.lock().await;
        let outcome = f(&mut engine);
        respond(outcome, message, engine.view())
    }

    async fn handle_status(&self) -> IpcResponse {
        let engine = self.engine.lock().await;
        IpcResponse::success("", Some(ResponseData::from_view(engine.view())))
    }

    async fn handle_feedback(&self, rating: Option<u8>) -> IpcResponse {
        let message = match rating {
            Some(r) => format!("評価 {} を記録しました", r),
            None => "評価をスキップしました".to_string(),
        };
        self.transition(&message, |e| e.submit_feedback(rating))
            .await
    }

    async fn handle_settings(&self) -> IpcResponse {
        let engine = self.engine.lock().await;
        let provider = self.provider.lock().await;
        let settings = match provider.as_ref() {
            Some(p) => p.settings().clone(),
            None => engine.settings().clone(),
        };
        IpcResponse::success(
            "",
            Some(ResponseData {
                timer: Some(engine.view()),
                settings: Some(settings),
            }),
        )
    }

    async fn handle_update_settings(&self, patch: SettingsPatch) -> IpcResponse {
        if patch.is_empty() {
            return IpcResponse::error("変更する設定を指定してください");
        }

        let mut engine = self.engine.lock().await;
        let mut guard = self.provider.lock().await;
        let Some(provider) = guard.as_mut() else {
            return IpcResponse::rejected("設定の変更にはログインが必要です", engine.view());
        };

        if let Err(e) = provider.update(&patch) {
            return IpcResponse::rejected(e.to_string(), engine.view());
        }
        let _ = engine.sync_settings(provider);

        let message = if engine.deferred_settings().is_some() {
            "設定を保存しました（時間の変更は現在のセッション終了後に反映されます）"
        } else {
            "設定を更新しました"
        };
        IpcResponse::success(
            message,
            Some(ResponseData {
                timer: Some(engine.view()),
                settings: Some(provider.settings().clone()),
            }),
        )
    }

    async fn handle_login(&self, user: String) -> IpcResponse {
        if let Err(e) = validate_user_name(&user) {
            return IpcResponse::error(e.to_string());
        }

        let mut engine = self.engine.lock().await;
        if engine.user().is_some_and(|current| current != user) {
            let _ = engine.sign_out();
        }

        let mut provider = FileSettingsProvider::load(self.paths.settings_path(&user));
        let _ = engine.sign_in(user.clone(), &mut provider);
        *self.provider.lock().await = Some(provider);

        let record = AuthRecord {
            user: user.clone(),
            signed_in_at: Utc::now(),
        };
        if let Err(e) = save_auth(&self.paths.auth_path(), &record) {
            warn!("Failed to remember signed-in user: {}", e);
        }

        IpcResponse::success(
            format!("{} としてログインしました", user),
            Some(ResponseData::from_view(engine.view())),
        )
    }

    async fn handle_logout(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        let outcome = engine.sign_out();
        if outcome.is_applied() {
            *self.provider.lock().await = None;
            if let Err(e) = clear_auth(&self.paths.auth_path()) {
                warn!("Failed to forget signed-in user: {}", e);
            }
        }
        respond(outcome, "ログアウトしました", engine.view())
    }

    async fn handle_resume(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        let outcome = engine.resume();
        let view = engine.view();
        match outcome {
            ResumeOutcome::Restored { .. } => IpcResponse::success(
                "保存されたセッションを復元しました",
                Some(ResponseData::from_view(view)),
            ),
            ResumeOutcome::CompletedWhileSuspended => IpcResponse::success(
                "中断中にセッションが終了しました",
                Some(ResponseData::from_view(view)),
            ),
            ResumeOutcome::NoSnapshot => IpcResponse::rejected("保存されたセッションはありません", view),
            ResumeOutcome::Stale => {
                IpcResponse::rejected("保存されたセッションが古いため破棄しました", view)
            }
            ResumeOutcome::Invalid => {
                IpcResponse::rejected("保存されたセッションが不正なため破棄しました", view)
            }
        }
    }
}

fn respond(outcome: TransitionOutcome, message: &str, view: TimerView) -> IpcResponse {
    match outcome {
        TransitionOutcome::Applied => {
            IpcResponse::success(message, Some(ResponseData::from_view(view)))
        }
        TransitionOutcome::Ignored(reason) => IpcResponse::rejected(reason.to_string(), view),
    }
}

// ============================================================================
// Tests
// ============================================================================
