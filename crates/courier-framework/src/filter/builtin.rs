//! Ready-made filters for common routing rules.

use std::borrow::Cow;

use async_trait::async_trait;

use courier_core::{BoxError, ChatType, Context, Update, UpdateKind};

use super::{Filter, FilterExt, predicate};

/// Text of message-like updates only. Callback queries are excluded even
/// though they may carry the message the button was attached to.
fn own_message_text(update: &Update) -> Option<&str> {
    match &update.kind {
        UpdateKind::Message(m)
        | UpdateKind::EditedMessage(m)
        | UpdateKind::ChannelPost(m)
        | UpdateKind::EditedChannelPost(m) => m.text_or_caption(),
        _ => None,
    }
}

/// Matches `/name`, `/name@bot` and `/name args` for any of the given names.
#[derive(Debug, Clone)]
pub struct Command {
    names: Vec<String>,
}

/// Matches messages starting with one of the given bot commands.
///
/// Names are given without the leading slash and compared case-insensitively.
///
/// ```rust,ignore
/// router.message(start, filter::command(["start", "help"]))
/// ```
pub fn command<I, S>(names: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Command {
        names: names
            .into_iter()
            .map(|n| n.as_ref().trim_start_matches('/').to_lowercase())
            .collect(),
    }
}

impl Command {
    /// Returns the command name of `text`, without the slash and any `@bot`
    /// suffix.
    pub fn parse(text: &str) -> Option<&str> {
        let token = text.strip_prefix('/')?.split_whitespace().next()?;
        let name = token.split_once('@').map_or(token, |(name, _)| name);
        (!name.is_empty()).then_some(name)
    }
}

#[async_trait]
impl Filter for Command {
    async fn allow(&self, _ctx: &Context, update: &Update) -> Result<bool, BoxError> {
        let Some(name) = own_message_text(update).and_then(Command::parse) else {
            return Ok(false);
        };
        let name = name.to_lowercase();
        Ok(self.names.iter().any(|n| *n == name))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("command({})", self.names.join(", ")))
    }
}

/// Matches updates that happened in a chat of the given type.
pub fn chat_type(kind: ChatType) -> impl Filter {
    predicate(move |update: &Update| update.chat().is_some_and(|c| c.kind == kind))
        .named(format!("chat_type({kind:?})"))
}

/// Matches message-like updates whose text (or caption) satisfies `f`.
pub fn text<F>(f: F) -> impl Filter
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    predicate(move |update: &Update| own_message_text(update).is_some_and(&f)).named("text")
}

/// Matches callback queries whose data starts with `prefix`.
pub fn callback_data_prefix(prefix: impl Into<String>) -> impl Filter {
    let prefix = prefix.into();
    let name = format!("callback_data_prefix({prefix})");
    predicate(move |update: &Update| {
        update
            .callback_query()
            .and_then(|q| q.data.as_deref())
            .is_some_and(|data| data.starts_with(prefix.as_str()))
    })
    .named(name)
}
