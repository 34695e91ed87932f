//! Inbound update model.
//!
//! An [`Update`] is exactly one of a closed set of kinds. The set is declared
//! once in [`define_kinds!`] and expands into:
//!
//! - [`Kind`]: the fieldless discriminant, used as the routing key
//! - [`UpdateKind`]: the sum type carrying the payload
//! - `RawUpdate`: the wire shape with one optional field per kind
//!
//! Declaration order is the classification priority for wire payloads that
//! (illegally) populate more than one field.

use serde::{Deserialize, Serialize};

use crate::types::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMemberUpdated, ChosenInlineResult, InlineQuery,
    Message, Poll, PollAnswer, PreCheckoutQuery, ShippingQuery, User,
};

macro_rules! define_kinds {
    ($( $(#[$doc:meta])* $variant:ident => $field:ident : $payload:ty ),* $(,)?) => {
        /// The routable kinds of update, in classification order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Kind {
            $( $(#[$doc])* $variant, )*
        }

        impl Kind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [Kind] = &[$(Kind::$variant),*];

            /// Number of routable kinds.
            pub const COUNT: usize = Self::ALL.len();

            /// Returns the wire field name of this kind.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Kind::$variant => stringify!($field), )*
                }
            }
        }

        /// The payload of an update, one variant per [`Kind`].
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum UpdateKind {
            $( $(#[$doc])* $variant($payload), )*
            /// The update carries no field this crate recognises.
            Unknown,
        }

        impl UpdateKind {
            /// Returns the routing kind, or `None` for [`UpdateKind::Unknown`].
            pub fn kind(&self) -> Option<Kind> {
                match self {
                    $( Self::$variant(_) => Some(Kind::$variant), )*
                    Self::Unknown => None,
                }
            }
        }

        #[derive(Default, Serialize, Deserialize)]
        struct RawUpdate {
            update_id: i64,
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                $field: Option<$payload>,
            )*
        }

        impl From<RawUpdate> for Update {
            fn from(raw: RawUpdate) -> Self {
                let RawUpdate { update_id, $($field),* } = raw;
                let kind = None
                    $( .or_else(|| $field.map(UpdateKind::$variant)) )*
                    .unwrap_or(UpdateKind::Unknown);
                Update { update_id, kind }
            }
        }

        impl From<Update> for RawUpdate {
            fn from(update: Update) -> Self {
                let mut raw = RawUpdate {
                    update_id: update.update_id,
                    ..Default::default()
                };
                match update.kind {
                    $( UpdateKind::$variant(payload) => raw.$field = Some(payload), )*
                    UpdateKind::Unknown => {}
                }
                raw
            }
        }
    };
}

define_kinds! {
    /// New incoming message.
    Message => message: Message,
    /// A known message was edited.
    EditedMessage => edited_message: Message,
    /// New channel post.
    ChannelPost => channel_post: Message,
    /// A known channel post was edited.
    EditedChannelPost => edited_channel_post: Message,
    /// New inline query.
    InlineQuery => inline_query: InlineQuery,
    /// An inline result was chosen by a user.
    ChosenInlineResult => chosen_inline_result: ChosenInlineResult,
    /// An inline keyboard button was pressed.
    CallbackQuery => callback_query: CallbackQuery,
    /// Shipping query for an invoice with flexible price.
    ShippingQuery => shipping_query: ShippingQuery,
    /// Pre-checkout query.
    PreCheckoutQuery => pre_checkout_query: PreCheckoutQuery,
    /// New poll state.
    Poll => poll: Poll,
    /// A user changed their answer in a non-anonymous poll.
    PollAnswer => poll_answer: PollAnswer,
    /// The bot's own membership status changed.
    MyChatMember => my_chat_member: ChatMemberUpdated,
    /// A chat member's status changed.
    ChatMember => chat_member: ChatMemberUpdated,
    /// A request to join a chat was sent.
    ChatJoinRequest => chat_join_request: ChatJoinRequest,
}

impl Kind {
    /// Dense index of this kind, usable as a table slot.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound update.
///
/// Decoding from platform JSON never fails because of an unrecognised kind:
/// such updates become [`UpdateKind::Unknown`] and are ignored by routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUpdate", into = "RawUpdate")]
pub struct Update {
    /// Monotonic identifier assigned by the platform.
    pub update_id: i64,
    /// The populated kind and its payload.
    pub kind: UpdateKind,
}

impl Update {
    /// Creates an update from its parts.
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// Returns the routing kind of this update.
    pub fn kind(&self) -> Option<Kind> {
        self.kind.kind()
    }

    /// Returns the message of message-like updates (messages, channel posts
    /// and their edits) and the originating message of callback queries.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            UpdateKind::CallbackQuery(q) => q.message.as_deref(),
            _ => None,
        }
    }

    /// Returns the callback query, if this is one.
    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    /// Returns the chat the update happened in, when there is one.
    pub fn chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::MyChatMember(u) | UpdateKind::ChatMember(u) => Some(&u.chat),
            UpdateKind::ChatJoinRequest(r) => Some(&r.chat),
            _ => self.message().map(|m| &m.chat),
        }
    }

    /// Returns the user who caused the update, when known.
    pub fn sender(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::InlineQuery(q) => Some(&q.from),
            UpdateKind::ChosenInlineResult(r) => Some(&r.from),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::ShippingQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::PollAnswer(a) => a.user.as_ref(),
            UpdateKind::MyChatMember(u) | UpdateKind::ChatMember(u) => Some(&u.from),
            UpdateKind::ChatJoinRequest(r) => Some(&r.from),
            UpdateKind::Poll(_) | UpdateKind::Unknown => None,
        }
    }
}
