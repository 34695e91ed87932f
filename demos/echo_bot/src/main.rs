//! Echo Bot Example
//!
//! A small bot routed by Courier. Updates are read as newline-delimited JSON
//! (one platform update per line) from stdin or a file, and replies are
//! printed to stdout as `sendMessage` payloads.
//!
//! # Routes
//!
//! ```text
//! message
//! ├── /start            ─▶ greeting
//! ├── /echo <text>      ─▶ echoes <text>
//! ├── group chats       ─▶ logged only
//! └── anything else     ─▶ echoes the whole text
//! callback_query
//! └── data "vote:*"     ─▶ acknowledges the vote
//! (unhandled)           ─▶ logged by the fallback
//! ```
//!
//! # Usage
//!
//! ```bash
//! echo '{"update_id":1,"message":{"message_id":1,"date":0,"chat":{"id":1,"type":"private"},"text":"/echo hi"}}' \
//!     | cargo run --package echo-bot
//!
//! cargo run --package echo-bot -- --input updates.jsonl --config courier.toml
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use courier::prelude::*;
use futures::{Stream, stream};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(about = "Route newline-delimited JSON updates through an echo bot")]
struct Args {
    /// File with one update per line. Reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Configuration file. Searched in the usual places when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

fn send_message(chat_id: i64, text: &str) {
    println!(
        "{}",
        json!({ "method": "sendMessage", "chat_id": chat_id, "text": text })
    );
}

fn chat_id(update: &Update) -> Result<i64, BoxError> {
    update
        .chat()
        .map(|chat| chat.id)
        .ok_or_else(|| "update has no chat".into())
}

fn text(update: &Update) -> &str {
    update
        .message()
        .and_then(Message::text_or_caption)
        .unwrap_or_default()
}

/// Greets the user.
struct Start;

#[async_trait]
impl Handler for Start {
    async fn handle(&self, _ctx: &Context, update: &Update) -> Result<(), BoxError> {
        let name = update.sender().map_or("there", |u| u.first_name.as_str());
        send_message(chat_id(update)?, &format!("Hello, {name}! Send me anything."));
        Ok(())
    }
}

/// Text to echo back: the arguments of `/echo`, or the whole text otherwise.
fn echo_reply(text: &str) -> &str {
    match filter::Command::parse(text) {
        Some(name) if name.to_lowercase() == "echo" => text
            .trim_start()
            .split_once(char::is_whitespace)
            .map_or("", |(_, args)| args.trim_start()),
        _ => text,
    }
}

/// Echoes the text after the command, or the whole text.
struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, _ctx: &Context, update: &Update) -> Result<(), BoxError> {
        let reply = echo_reply(text(update));
        if !reply.is_empty() {
            send_message(chat_id(update)?, reply);
        }
        Ok(())
    }
}

fn build_router() -> Router {
    let log_group = handler_fn(|_ctx, update| {
        Box::pin(async move {
            let group = update.chat().and_then(|c| c.title.as_deref()).unwrap_or("?");
            info!(group, text = text(update), "Group message");
            Ok(())
        })
    });

    let vote = handler_fn(|_ctx, update| {
        Box::pin(async move {
            let query = update.callback_query().ok_or("not a callback query")?;
            let choice = query
                .data
                .as_deref()
                .and_then(|d| d.strip_prefix("vote:"))
                .unwrap_or_default();
            info!(user = query.from.id, choice, "Vote received");
            Ok(())
        })
    });

    let unhandled = handler_fn(|_ctx, update| {
        Box::pin(async move {
            debug!(update_id = update.update_id, kind = ?update.kind(), "No route for update");
            Ok(())
        })
    });

    Router::new()
        .use_middleware(middleware::logging())
        .use_middleware(middleware::recover())
        .use_middleware(middleware::timeout(Duration::from_secs(5)))
        .message(Start, filter::command(["start"]))
        .message(Echo, filter::command(["echo"]))
        .message(
            log_group,
            filter::any((
                filter::chat_type(ChatType::Group),
                filter::chat_type(ChatType::Supergroup),
            )),
        )
        .message(Echo, ())
        .callback_query(vote, filter::callback_data_prefix("vote:"))
        .fallback(unhandled)
}

// ============================================================================
// Input
// ============================================================================

/// Decodes one update per non-empty line, skipping lines that fail to parse.
fn json_lines<R>(reader: R) -> impl Stream<Item = Update>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(reader.lines(), |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<Update>(&line) {
                    Ok(update) => return Some((update, lines)),
                    Err(e) => warn!(error = %e, "Skipping malformed update"),
                },
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    return None;
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Runtime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder
        .build(build_router())
        .context("loading configuration")?;
    info!(router = ?runtime.router(), "Echo bot ready");

    let stats = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            runtime
                .run_until_ctrl_c(json_lines(BufReader::new(file)))
                .await?
        }
        None => {
            runtime
                .run_until_ctrl_c(json_lines(BufReader::new(tokio::io::stdin())))
                .await?
        }
    };

    info!(?stats, "Echo bot stopped");
    Ok(())
}
