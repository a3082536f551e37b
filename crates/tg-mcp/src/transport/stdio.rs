//! Stdio Transport
//!
//! Newline-delimited JSON-RPC over one input/output pair. Requests are
//! dispatched concurrently, so a peer may pipeline them; a single writer task
//! emits each response under the id of the request it answers.
//!
//! A malformed frame gets an error response and the stream stays open.
//! On input EOF, in-flight requests finish and flush before the session ends.
//! If the output side fails, in-flight requests are aborted.

use super::{McpHandler, Transport};
use crate::{JsonRpcError, McpRequest, McpResponse, McpServer};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tg_core::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Responses queued for the writer before request tasks start waiting
const RESPONSE_BUFFER: usize = 64;

/// Stdio transport - reads JSON-RPC from stdin, writes to stdout
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn serve(self, server: Arc<McpServer>) -> Result<()> {
        info!("Starting MCP stdio transport");
        StdioSession::new(server)
            .run(tokio::io::stdin(), tokio::io::stdout())
            .await?;
        info!("Stdio transport shutting down");
        Ok(())
    }
}

/// Ids of in-flight requests, JSON-encoded
#[derive(Clone, Default)]
struct PendingRequests {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns one pending id for the life of its request task.
///
/// Dropping it unanswered (the handler panicked, or the task was aborted)
/// releases the id and queues an internal error under it.
struct InFlight {
    key: String,
    id: Option<Value>,
    pending: PendingRequests,
    tx: mpsc::Sender<McpResponse>,
    answered: bool,
}

impl InFlight {
    async fn answer(mut self, response: McpResponse) {
        self.answered = true;
        // release the id before the caller can see the response
        self.pending.lock().remove(&self.key);
        if self.tx.send(response).await.is_err() {
            debug!(id = %self.key, "Response discarded, output closed");
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
        if self.answered {
            return;
        }
        let error = JsonRpcError::internal_error("request handler failed");
        if self.tx.try_send(McpResponse::error(self.id.take(), error)).is_err() {
            debug!(id = %self.key, "Could not report failed request");
        }
    }
}

/// One decoded input line
enum Frame {
    Request { key: String, request: McpRequest },
    Notification(McpRequest),
    Malformed(McpResponse),
}

fn correlation_key(id: &Value) -> String {
    id.to_string()
}

fn decode_frame(line: &[u8]) -> Frame {
    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            let err = Error::decode(e.to_string());
            warn!(error = %err, "Dropping malformed frame");
            return Frame::Malformed(McpResponse::error(None, JsonRpcError::parse_error(err.to_string())));
        }
    };

    let id = value.get("id").filter(|id| !id.is_null()).cloned();

    match serde_json::from_value::<McpRequest>(value) {
        Ok(request) => match id {
            Some(id) => Frame::Request {
                key: correlation_key(&id),
                request,
            },
            None => Frame::Notification(request),
        },
        Err(e) => {
            let err = Error::decode(e.to_string());
            warn!(error = %err, "Rejecting frame that is not a JSON-RPC request");
            Frame::Malformed(McpResponse::error(id, JsonRpcError::invalid_request(err.to_string())))
        }
    }
}

/// A stdio session over any reader/writer pair
pub struct StdioSession<H> {
    handler: Arc<H>,
    pending: PendingRequests,
}

impl<H: McpHandler + 'static> StdioSession<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            pending: PendingRequests::default(),
        }
    }

    /// Number of requests dispatched but not yet answered
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Serve until the input reaches EOF or the output fails.
    ///
    /// Read errors end the session like EOF; the caller decides whether that
    /// is fatal.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<McpResponse>(RESPONSE_BUFFER);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let mut tasks = JoinSet::new();
        let mut output_closed = false;

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut line) => match read {
                    Ok(0) => {
                        if !line.is_empty() {
                            self.dispatch(&line, &tx, &mut tasks).await;
                        }
                        debug!("Stdio input reached EOF");
                        break;
                    }
                    Ok(_) => {
                        self.dispatch(&line, &tx, &mut tasks).await;
                        line.clear();
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read from stdio input");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
                _ = tx.closed() => {
                    warn!("Stdio output closed, abandoning in-flight requests");
                    output_closed = true;
                    break;
                }
            }
        }

        if output_closed {
            tasks.abort_all();
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        drop(tx);
        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Stdio writer stopped with an error"),
            Err(e) => error!(error = %e, "Stdio writer task failed"),
        }
        Ok(())
    }

    async fn dispatch(&self, line: &[u8], tx: &mpsc::Sender<McpResponse>, tasks: &mut JoinSet<()>) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        match decode_frame(line) {
            Frame::Malformed(response) => {
                let _ = tx.send(response).await;
            }
            Frame::Notification(request) => self.handler.handle_notification(request).await,
            Frame::Request { key, request } => {
                debug!(method = %request.method, id = %key, "Received request");

                if !self.pending.lock().insert(key.clone()) {
                    warn!(id = %key, "Duplicate request id while still in flight");
                    let error = JsonRpcError::invalid_request(format!(
                        "Request id {} is already in flight",
                        key
                    ));
                    let _ = tx.send(McpResponse::error(request.id, error)).await;
                    return;
                }

                let in_flight = InFlight {
                    key,
                    id: request.id.clone(),
                    pending: self.pending.clone(),
                    tx: tx.clone(),
                    answered: false,
                };
                let handler = Arc::clone(&self.handler);
                tasks.spawn(async move {
                    let response = handler.handle_request(request).await;
                    in_flight.answer(response).await;
                });
            }
        }
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Request task panicked");
        }
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<McpResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_json = serde_json::to_string(&response)?;
        debug!(response = %response_json, "Sending response");

        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
