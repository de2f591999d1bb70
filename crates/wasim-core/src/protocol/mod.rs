//! Protocol module containing message types and the binary frame codec.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{
    decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame, FrameHeader,
    ProtocolError,
};
pub use messages::*;
pub use sequence::SequenceCounter;
