pub mod consts;
pub mod dispatcher;
pub mod framing;
pub mod handshake;
pub mod hpack;
pub mod settings;
pub mod writer;

pub use dispatcher::{ResponseDispatcher, ResponseEvent, Termination};
pub use framing::{FrameReader, FrameWriter};
pub use handshake::{perform_handshake, HandshakeOutcome, WindowGrant};
pub use writer::{ChunkingPolicy, RequestStreamWriter, WriteOutcome};
