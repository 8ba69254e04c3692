//! The wire codec: frame serialization/parsing and the output chunker
//! (spec §4.1, §4.2).

pub mod chunk;
pub mod frame;

pub use chunk::{chunk_output, DEFAULT_MAX_PAYLOAD};
pub use frame::{AgentReply, ChunkMarker, Frame};
