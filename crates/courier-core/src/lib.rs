//! # Courier Core
//!
//! The data layer of the Courier bot router.
//!
//! This crate provides the values that flow through a dispatch:
//! - **Updates**: the closed set of inbound event kinds ([`Update`], [`UpdateKind`], [`Kind`])
//! - **Context**: cancellation and per-dispatch extensions ([`Context`])
//! - **Payloads**: the minimal domain objects filters inspect ([`types`])
//! - **Input files**: a boundary adapter for uploads ([`InputFile`])
//!
//! Nothing here knows about handlers or routing; see `courier-framework`.
//!
//! ## Classification
//!
//! Platform JSON carries one optional field per kind. Decoding folds those
//! fields into a single [`UpdateKind`] variant, picking the first populated
//! field in declaration order:
//!
//! ```text
//! { "update_id": 7, "message": {..} }   ──▶  Update { update_id: 7, kind: UpdateKind::Message(..) }
//! { "update_id": 8, "something_new": 1 } ──▶  Update { update_id: 8, kind: UpdateKind::Unknown }
//! ```

pub mod context;
pub mod error;
pub mod input_file;
pub mod types;
pub mod update;

pub use context::Context;
pub use error::{BoxError, CoreError, CoreResult};
pub use input_file::InputFile;
pub use types::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMember, ChatMemberUpdated, ChatType,
    ChosenInlineResult, InlineQuery, Message, Poll, PollAnswer, PollOption, PreCheckoutQuery,
    ShippingAddress, ShippingQuery, User,
};
pub use update::{Kind, Update, UpdateKind};
