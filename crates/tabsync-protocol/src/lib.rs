//! Wire types and codecs for tabsync.
//!
//! This crate defines everything that crosses a boundary between tabs or
//! between a tab and the identity provider:
//!
//! - **Token codec** ([`decode`], [`Claims`], [`Credential`]): reads the
//!   claims out of a bearer credential without verifying its signature.
//! - **Types** ([`BroadcastMessage`], [`Profile`], [`TabId`],
//!   [`Generation`]): the structures that travel on the cross-tab channel.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how broadcast messages
//!   are turned into frames and back.
//! - **Errors** ([`ProtocolError`]).
//! - [`millis`]: serde helpers for millisecond `Duration` config fields.
//!
//! # Architecture
//!
//! ```text
//! Session Layer (above)  ← decodes credentials, builds messages
//!     ↕
//! Protocol Layer (this crate)  ← claims, messages, frames
//!     ↕
//! Transport Layer (below)  ← moves opaque frames between tabs
//! ```

mod codec;
mod error;
pub mod millis;
pub mod token;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use token::{Claims, Credential, decode};
pub use types::{
    BroadcastMessage, Generation, MessageKind, Profile, SessionPayload, TabId,
    unix_millis,
};
