//! The 12-byte NUL-padded ASCII command tag carried in every frame header.

use std::fmt;

use spv_chain::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A Bitcoin message type.
///
/// Bitcoin identifies messages by a 12-byte command string; we consider
/// this a serialization detail and dispatch on the enum instead. Tags this
/// client does not speak decode to [`Command::Unknown`] so the connection
/// can skip the frame without dropping the peer.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Command {
    Addr,
    Alert,
    GetAddr,
    GetBlocks,
    GetHeaders,
    Headers,
    Inv,
    MemPool,
    Ping,
    Pong,
    Reject,
    SendHeaders,
    Verack,
    Version,
    /// A well-formed command tag with no handler in this client.
    Unknown([u8; 12]),
}

impl Command {
    /// The wire form of this command.
    pub fn bytes(&self) -> [u8; 12] {
        match self {
            Command::Addr => *b"addr\0\0\0\0\0\0\0\0",
            Command::Alert => *b"alert\0\0\0\0\0\0\0",
            Command::GetAddr => *b"getaddr\0\0\0\0\0",
            Command::GetBlocks => *b"getblocks\0\0\0",
            Command::GetHeaders => *b"getheaders\0\0",
            Command::Headers => *b"headers\0\0\0\0\0",
            Command::Inv => *b"inv\0\0\0\0\0\0\0\0\0",
            Command::MemPool => *b"mempool\0\0\0\0\0",
            Command::Ping => *b"ping\0\0\0\0\0\0\0\0",
            Command::Pong => *b"pong\0\0\0\0\0\0\0\0",
            Command::Reject => *b"reject\0\0\0\0\0\0",
            Command::SendHeaders => *b"sendheaders\0",
            Command::Verack => *b"verack\0\0\0\0\0\0",
            Command::Version => *b"version\0\0\0\0\0",
            Command::Unknown(bytes) => *bytes,
        }
    }
}

impl BitcoinSerialize for Command {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&self.bytes())
    }
}

impl BitcoinDeserialize for Command {
    fn bitcoin_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        let bytes = <[u8; 12]>::bitcoin_deserialize(&mut reader)?;
        if bytes[11] != 0 {
            return Err(SerializationError::Parse("command is not NUL-terminated"));
        }
        let command = match &bytes {
            b"addr\0\0\0\0\0\0\0\0" => Command::Addr,
            b"alert\0\0\0\0\0\0\0" => Command::Alert,
            b"getaddr\0\0\0\0\0" => Command::GetAddr,
            b"getblocks\0\0\0" => Command::GetBlocks,
            b"getheaders\0\0" => Command::GetHeaders,
            b"headers\0\0\0\0\0" => Command::Headers,
            b"inv\0\0\0\0\0\0\0\0\0" => Command::Inv,
            b"mempool\0\0\0\0\0" => Command::MemPool,
            b"ping\0\0\0\0\0\0\0\0" => Command::Ping,
            b"pong\0\0\0\0\0\0\0\0" => Command::Pong,
            b"reject\0\0\0\0\0\0" => Command::Reject,
            b"sendheaders\0" => Command::SendHeaders,
            b"verack\0\0\0\0\0\0" => Command::Verack,
            b"version\0\0\0\0\0" => Command::Version,
            _ => Command::Unknown(bytes),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(12);
        f.write_str(&String::from_utf8_lossy(&bytes[..end]))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Command")
            .field(&format_args!("{}", self))
            .finish()
    }
}
