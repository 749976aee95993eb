//! Replicated observable object store shared by one match server and its
//! clients.
//!
//! The host side owns the authoritative records and the match's TCP
//! endpoint; each client keeps a local snapshot it refreshes with
//! `pull`/`checkout` and publishes its own fields with `commit`/`push`.
//! The match server is the sole writer of the server-state record and of
//! the cross-player bookkeeping fields; each client is the sole writer of
//! its own action, readiness, and game-over acknowledgement, so deltas from
//! the two sides never collide.

pub mod client;
pub mod errors;
pub mod host;
pub mod proto;
pub mod records;

pub use client::FrameClient;
pub use errors::FrameError;
pub use host::{FrameHandle, FrameHost, FrameState, PlayerSlot};
pub use records::{Pid, PlayerRow, ServerStateRow};
