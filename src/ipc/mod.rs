//! Wire protocol and local transport

pub mod codec;
pub mod protocol;
pub mod transport;

pub use codec::{Frame, FrameReader, FrameWriter};
pub use protocol::{
    codes, constants, ClosePayload, Command, HandshakePayload, IpcRequest, IpcResponse, Opcode,
};
pub use transport::{IpcListener, IpcStream};
