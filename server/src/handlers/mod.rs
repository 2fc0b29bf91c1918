//! One function per protocol method.
//!
//! Request handlers return their typed result; [`handle_request`] decodes params and
//! encodes the result so dispatch only deals in JSON values.

mod lifecycle;
mod options;
mod prepare;
mod targets;
mod workspace;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use xcode_bsp_engine::normalize_path;
use xcode_bsp_rpc::{ErrorResponse, IncomingMessage, error_codes, file_uri_to_path};
use xcode_bsp_types::JsonRpcId;
use xcode_bsp_types::bsp::{
    DidChangeWatchedFilesParams, RegisterForChangesParams, SourceKitOptionsParams,
};

use crate::context::ServerContext;
use crate::registry::{NotificationMethod, RequestMethod};

pub use lifecycle::exit_code;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid params: {0}")]
    InvalidParams(#[source] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            HandlerError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            HandlerError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    #[must_use]
    pub fn into_response(self, id: JsonRpcId) -> ErrorResponse {
        let message = match &self {
            HandlerError::InvalidParams(_) => self.to_string(),
            HandlerError::Internal(err) => format!("{err:#}"),
        };
        ErrorResponse::new(id, self.code(), message)
    }
}

pub async fn handle_request(
    ctx: &ServerContext,
    method: RequestMethod,
    message: &IncomingMessage,
) -> Result<serde_json::Value, HandlerError> {
    match method {
        RequestMethod::Initialize => encode(lifecycle::initialize(ctx).await?),
        RequestMethod::Shutdown => {
            lifecycle::shutdown(ctx);
            encode(())
        }
        RequestMethod::BuildTargets => encode(targets::build_targets(ctx).await?),
        RequestMethod::Sources => encode(targets::sources(ctx, params(message)?).await?),
        RequestMethod::InverseSources => {
            encode(targets::inverse_sources(ctx, params(message)?).await?)
        }
        RequestMethod::Prepare => {
            prepare::prepare(ctx, params(message)?).await?;
            encode(())
        }
        RequestMethod::RegisterForChanges => {
            let params: Option<RegisterForChangesParams> = params(message)?;
            options::register_for_changes(ctx, &params.unwrap_or_default());
            encode(())
        }
        RequestMethod::SourceKitOptions => {
            let params: SourceKitOptionsParams = params(message)?;
            encode(options::source_kit_options(ctx, params).await)
        }
        RequestMethod::WaitForBuildSystemUpdates => {
            ctx.state.wait_for_idle().await;
            encode(())
        }
    }
}

/// Returns the process exit code once `build/exit` arrives.
///
/// Runs on the read loop itself, so its effects are visible to every message after it.
pub fn handle_notification(
    ctx: &ServerContext,
    method: NotificationMethod,
    message: &IncomingMessage,
) -> anyhow::Result<Option<i32>> {
    match method {
        NotificationMethod::Initialized => {
            tracing::debug!("client initialized");
            Ok(None)
        }
        NotificationMethod::Exit => Ok(Some(exit_code(ctx))),
        NotificationMethod::DidChangeWatchedFiles => {
            let params: Option<DidChangeWatchedFilesParams> = message
                .params()
                .context("Failed to decode didChangeWatchedFiles params")?;
            workspace::did_change_watched_files(ctx, &params.unwrap_or_default());
            Ok(None)
        }
    }
}

fn params<T: DeserializeOwned>(message: &IncomingMessage) -> Result<T, HandlerError> {
    message.params().map_err(HandlerError::InvalidParams)
}

fn encode<T: Serialize>(result: T) -> Result<serde_json::Value, HandlerError> {
    Ok(serde_json::to_value(result).context("Failed to encode result")?)
}

/// Normalized filesystem path of a `file://` document URI.
fn document_path(uri: &str) -> Option<String> {
    file_uri_to_path(uri).map(|path| normalize_path(&path.to_string_lossy()))
}
