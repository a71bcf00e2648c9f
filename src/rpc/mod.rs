/// Internal RPC transport
///
/// Line-delimited JSON over TCP. Each request names a command pattern and
/// carries a payload; each response echoes the request id and holds either a
/// `response` or an `err` fault.
///
/// Commands:
/// - `check-auth` `{token}` verifies an access token for another service
/// - `issue-reset-code` `{email}` hands a fresh reset code to the service
///   that delivers it

pub mod protect;

pub use protect::ProtectService;

use crate::account::AccountManager;
use crate::error::{RpcFault, WardenError, WardenResult};
use axum::http::StatusCode;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

pub const CHECK_AUTH: &str = "check-auth";
pub const ISSUE_RESET_CODE: &str = "issue-reset-code";

/// Longest request line accepted; longer lines close the connection
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

const NO_HANDLER: &str = "There is no matching message handler defined in the remote service.";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub id: Option<String>,
    pub pattern: RpcPattern,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcPattern {
    pub cmd: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<RpcFault>,
    pub is_disposed: bool,
}

impl RpcResponse {
    fn ok(id: Option<String>, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            err: None,
            is_disposed: true,
        }
    }

    fn fault(id: Option<String>, err: RpcFault) -> Self {
        Self {
            id,
            response: None,
            err: Some(err),
            is_disposed: true,
        }
    }

    fn bad_request(message: String) -> Self {
        Self::fault(
            None,
            RpcFault {
                status_code: StatusCode::BAD_REQUEST.as_u16(),
                message,
            },
        )
    }

    fn to_line(&self) -> String {
        // Serializing plain structs and JSON values cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CheckAuthPayload {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueResetCodePayload {
    email: String,
}

/// Services reachable over the RPC transport
#[derive(Clone)]
pub struct RpcHandlers {
    pub protect: Arc<ProtectService>,
    pub accounts: Arc<AccountManager>,
}

impl RpcHandlers {
    pub fn new(protect: Arc<ProtectService>, accounts: Arc<AccountManager>) -> Self {
        Self { protect, accounts }
    }

    /// Handle one request line and produce the response line
    pub async fn handle_message(&self, line: &str) -> String {
        let response = match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(error = %e, "malformed rpc message");
                RpcResponse::bad_request(format!("Malformed message: {}", e))
            }
        };

        response.to_line()
    }

    async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        debug!(id = ?request.id, cmd = %request.pattern.cmd, "rpc request");

        let result = match request.pattern.cmd.as_str() {
            CHECK_AUTH => self.check_auth(request.data).await,
            ISSUE_RESET_CODE => self.issue_reset_code(request.data).await,
            other => {
                warn!(cmd = %other, "no rpc handler");
                return RpcResponse::fault(
                    request.id,
                    RpcFault {
                        status_code: StatusCode::NOT_FOUND.as_u16(),
                        message: NO_HANDLER.to_string(),
                    },
                );
            }
        };

        match result {
            Ok(value) => RpcResponse::ok(request.id, value),
            Err(e) => RpcResponse::fault(request.id, e.rpc_fault()),
        }
    }

    async fn check_auth(&self, data: Value) -> WardenResult<Value> {
        let payload: CheckAuthPayload = serde_json::from_value(data)
            .map_err(|e| WardenError::Validation(format!("Invalid check-auth payload: {}", e)))?;

        let account = self
            .protect
            .check_auth(payload.token.as_deref().unwrap_or_default())
            .await?;

        serde_json::to_value(account)
            .map_err(|e| WardenError::Internal(format!("Failed to encode account: {}", e)))
    }

    async fn issue_reset_code(&self, data: Value) -> WardenResult<Value> {
        let payload: IssueResetCodePayload = serde_json::from_value(data).map_err(|e| {
            WardenError::Validation(format!("Invalid issue-reset-code payload: {}", e))
        })?;

        let code = self.accounts.issue_reset_code(&payload.email).await?;
        Ok(json!({ "code": code }))
    }
}

/// TCP listener serving the RPC protocol
pub struct RpcServer {
    handlers: RpcHandlers,
}

impl RpcServer {
    pub fn new(handlers: RpcHandlers) -> Self {
        Self { handlers }
    }

    /// Accept connections forever, one task per connection
    pub async fn serve(self, addr: SocketAddr) -> WardenResult<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("RPC listener on {}", addr);
        self.serve_listener(listener).await
    }

    pub async fn serve_listener(self, listener: TcpListener) -> WardenResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let handlers = self.handlers.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(handlers, stream).await {
                    warn!(peer = %peer, error = %e, "rpc connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection(handlers: RpcHandlers, stream: TcpStream) -> Result<(), LinesCodecError> {
    let (reader, writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));
    let mut replies = FramedWrite::new(writer, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(limit = MAX_MESSAGE_BYTES, "rpc message too long, closing connection");
                let fault = RpcResponse::bad_request(format!(
                    "Message exceeds {} bytes",
                    MAX_MESSAGE_BYTES
                ));
                replies.send(fault.to_line()).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if line.trim().is_empty() {
            continue;
        }

        replies.send(handlers.handle_message(&line).await).await?;
    }

    Ok(())
}
