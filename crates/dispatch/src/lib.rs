//! Client-side dispatch: the relay transport, reply normalization, failure
//! classification, and the per-session tier cascade.

pub mod classify;
pub mod normalize;
pub mod relay_client;
pub mod session;

pub use normalize::{extract_reply_text, RawReply};
pub use relay_client::{HttpRelayClient, RelayTransport};
pub use session::{CascadeEvent, CascadeOutcome, ChatSession, SessionOptions, EXHAUSTED_NOTICE};
