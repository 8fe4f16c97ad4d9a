//! Subcommand bodies. Output goes to the supplied writer; diagnostics go
//! through `tracing` on stderr.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use serde_json::Value;
use tabdeck_store::api::{self, SaveRequest, SaveResponse};
use tabdeck_store::{RetryDecision, RetryPolicy as _};
use tokio::io::AsyncReadExt as _;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::AppContext;

/// How a command finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Completed normally.
    Success,
    /// The request was rejected or the store failed.
    Failed,
    /// Saved, but to storage the retry policy rejects.
    RetryElsewhere,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Self::SUCCESS,
            Status::Failed => Self::from(1),
            Status::RetryElsewhere => Self::from(2),
        }
    }
}

/// Read a JSON request body from `input`, or stdin for `None` and `-`.
pub async fn read_body(input: Option<&Path>) -> Result<Value> {
    let text = match input {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            let _ = tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

/// Save `body`, filling in `pin` when the body has none.
pub async fn save(
    ctx: &AppContext,
    mut body: Value,
    pin: Option<&str>,
    out: &mut impl Write,
) -> Result<Status> {
    if let (Some(pin), Some(fields)) = (pin, body.as_object_mut()) {
        let _ = fields
            .entry("pin")
            .or_insert_with(|| Value::String(pin.to_string()));
    }

    let writer = ctx.writer();
    match api::save_outcome(&writer, &ctx.authorizer(), SaveRequest::from_body(body)).await {
        Ok(outcome) => {
            let decision = ctx.retry_policy().decide(&outcome);
            let response = SaveResponse::from(outcome);
            print_json(out, &response)?;
            if let Some(warning) = &response.warning {
                warn!(path = ?response.location, "{warning}");
            }
            match decision {
                RetryDecision::Accept => Ok(Status::Success),
                RetryDecision::RetryElsewhere { reason } => {
                    warn!(%reason, "save landed on ephemeral storage");
                    Ok(Status::RetryElsewhere)
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "save rejected");
            print_json(out, &e.body())?;
            Ok(Status::Failed)
        }
    }
}

/// Print the freshest manifest.
pub async fn show(ctx: &AppContext, out: &mut impl Write) -> Result<Status> {
    match api::load(&ctx.reader(), &ctx.base_dir).await {
        Ok(loaded) => {
            info!(source = %loaded.source.display(), "manifest loaded");
            print_json(out, &loaded.manifest)?;
            Ok(Status::Success)
        }
        Err(e) => {
            print_json(out, &e.body())?;
            Ok(Status::Failed)
        }
    }
}

/// Stream watch events as SSE frames until `cancel` fires.
pub async fn watch(ctx: &AppContext, cancel: CancellationToken, out: &mut impl Write) -> Result<Status> {
    let (mut events, handle) = ctx.watcher().spawn(cancel.clone());
    while let Some(event) = events.recv().await {
        let frame = event.to_sse_frame().context("Failed to encode watch event")?;
        if let Err(e) = out.write_all(frame.as_bytes()).and_then(|()| out.flush()) {
            // Subscriber went away; stop the loop with it.
            info!(error = %e, "watch output closed");
            cancel.cancel();
            break;
        }
    }
    drop(events);
    let exit = handle.await.context("Watch task failed")?;
    info!(?exit, "watch ended");
    Ok(Status::Success)
}

/// Print effective settings with the PIN masked.
pub fn settings(ctx: &AppContext, out: &mut impl Write) -> Result<Status> {
    print_json(out, &ctx.settings.redacted())?;
    Ok(Status::Success)
}

fn print_json(out: &mut impl Write, value: &impl serde::Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("Failed to encode output")?;
    writeln!(out).context("Failed to write output")?;
    Ok(())
}
