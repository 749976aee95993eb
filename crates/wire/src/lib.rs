//! Wire types shared by the matchmaking RPC and the per-match dataframe
//! endpoints: the RPC messages themselves plus the length-prefixed frame
//! codec both protocols run over.

pub mod framing;
pub mod messages;

pub use framing::{read_frame, write_frame, MAX_FRAME_LEN};
pub use messages::{QuickMatchReply, QuickMatchRequest};
