//! The server loop: frame messages off the input, handle notifications inline and
//! each request on its own task.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use xcode_bsp_rpc::{ErrorResponse, IncomingMessage, Response, read_messages};

use crate::context::ServerContext;
use crate::handlers::{exit_code, handle_notification, handle_request};
use crate::registry::{MethodKind, MethodRegistry, NotificationMethod, RequestMethod};

/// Serve until `build/exit`, returning the process exit code.
///
/// Notifications are handled on the read loop in receipt order; requests each get
/// their own task. If the input closes first, in-flight requests are allowed to finish
/// and the code is derived from whether `build/shutdown` was received.
pub async fn serve<R>(
    reader: R,
    ctx: Arc<ServerContext>,
    registry: Arc<MethodRegistry>,
) -> Result<i32>
where
    R: AsyncRead + Unpin,
{
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<i32>();

    let read_result = {
        let ctx = Arc::clone(&ctx);
        let on_message = move |message: IncomingMessage| match registry.lookup(message.method()) {
            Some(MethodKind::Notification(notification)) => {
                notify(&ctx, notification, &message, &exit_tx);
            }
            kind => {
                let request = match kind {
                    Some(MethodKind::Request(request)) => Some(request),
                    _ => None,
                };
                let ctx = Arc::clone(&ctx);
                // Held until answered; input EOF waits for every sender to drop.
                let in_flight = exit_tx.clone();
                tokio::spawn(async move {
                    respond(&ctx, request, message).await;
                    drop(in_flight);
                });
            }
        };

        tokio::select! {
            Some(code) = exit_rx.recv() => return Ok(code),
            result = read_messages(reader, on_message) => result,
        }
    };
    read_result.context("Failed to read from client")?;

    tracing::info!("input closed; waiting for in-flight messages");
    if let Some(code) = exit_rx.recv().await {
        return Ok(code);
    }
    Ok(exit_code(&ctx))
}

fn notify(
    ctx: &ServerContext,
    notification: NotificationMethod,
    message: &IncomingMessage,
    exit_tx: &mpsc::UnboundedSender<i32>,
) {
    let method = message.method();
    match handle_notification(ctx, notification, message) {
        Ok(Some(code)) => {
            tracing::info!("exit requested (code {code})");
            let _ = exit_tx.send(code);
        }
        Ok(None) => {}
        Err(err) => tracing::error!("{method} failed: {err:#}"),
    }
}

/// Answer a request, or report a method this server does not implement.
async fn respond(ctx: &ServerContext, request: Option<RequestMethod>, message: IncomingMessage) {
    let method = message.method();
    let sent = match (request, message.id().cloned()) {
        (Some(request), Some(id)) => match handle_request(ctx, request, &message).await {
            Ok(result) => ctx.writer.send(&Response::new(id, result)).await,
            Err(err) => {
                tracing::error!("{method} failed: {err:#}");
                ctx.writer.send(&err.into_response(id)).await
            }
        },
        (Some(_), None) => {
            tracing::debug!("Ignoring request {method} sent without an id");
            return;
        }
        (None, Some(id)) => {
            tracing::warn!("Unhandled request: {method}");
            ctx.writer
                .send(&ErrorResponse::method_not_found(id, method))
                .await
        }
        (None, None) => {
            tracing::debug!("Ignoring unknown notification {method}");
            return;
        }
    };
    if let Err(err) = sent {
        tracing::error!("Failed to send response to {method}: {err:#}");
    }
}
