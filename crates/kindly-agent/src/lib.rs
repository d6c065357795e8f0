// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply side of the Kindly companion.
//!
//! [`Companion`] ties the pieces together for each user message: the
//! message is logged and queued for background indexing, context is
//! retrieved, and a reply is generated through the [`ReplyComposer`], whose
//! [`AntiRepetitionGuard`] asks for a rephrase when a draft repeats a recent
//! reply.

pub mod companion;
pub mod composer;
pub mod guard;
pub mod recording;
pub mod shutdown;

pub use companion::{Companion, Reply, build_indexer};
pub use composer::{ComposedReply, ReplyComposer};
pub use guard::{AntiRepetitionGuard, RepetitionCheck};
pub use recording::register_metrics;
pub use shutdown::install_signal_handler;
