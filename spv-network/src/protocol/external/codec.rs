//! A Tokio codec mapping byte streams to Bitcoin message streams.

use std::fmt;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use spv_chain::{
    block,
    compactint::CompactInt,
    parameters::Network,
    serialization::{sha256d, BitcoinDeserialize, BitcoinSerialize, SerializationError as Error},
};

use crate::constants;
use crate::meta_addr::MetaAddr;

use super::{
    command::Command,
    inv::InventoryHash,
    message::{GetBlocks, GetHeaders, Message, RejectReason, Version},
    types::*,
};

/// The length of a Bitcoin message header.
const HEADER_LEN: usize = 24usize;

/// Maximum size of a protocol message body.
const MAX_PROTOCOL_MESSAGE_LEN: usize = 2 * 1024 * 1024;

/// A codec which produces Bitcoin messages from byte streams and vice versa.
///
/// A frame the decoder cannot yet complete is not an error: it reports
/// "no message" and the framing layer retries after more I/O. A frame
/// with an unknown (or `alert`) command is skipped whole. Everything
/// else malformed is an error, which hangs up on the offending peer.
pub struct Codec {
    builder: Builder,
    state: DecodeState,
}

/// A builder for specifying [`Codec`] options.
pub struct Builder {
    /// The network magic to use in encoding.
    network: Network,
    /// The protocol version to speak when encoding/decoding.
    version: ProtocolVersion,
    /// The maximum allowable message length.
    max_len: usize,
    /// An optional label to use for reporting metrics.
    metrics_label: Option<String>,
}

impl Codec {
    /// Return a builder for constructing a [`Codec`].
    pub fn builder() -> Builder {
        Builder {
            network: Network::Testnet,
            version: constants::CURRENT_VERSION,
            max_len: MAX_PROTOCOL_MESSAGE_LEN,
            metrics_label: None,
        }
    }

    /// Reconfigure the version used by the codec, e.g., after completing a handshake.
    pub fn reconfigure_version(&mut self, version: ProtocolVersion) {
        self.builder.version = version;
    }
}

impl Builder {
    /// Finalize the builder and return a [`Codec`].
    pub fn finish(self) -> Codec {
        Codec {
            builder: self,
            state: DecodeState::Head,
        }
    }

    /// Configure the codec for the given [`Network`].
    pub fn for_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Configure the codec for the given protocol version.
    #[allow(dead_code)]
    pub fn for_version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    /// Configure the codec's maximum accepted payload size, in bytes.
    #[allow(dead_code)]
    pub fn with_max_body_len(mut self, len: usize) -> Self {
        self.max_len = len;
        self
    }

    /// Configure the codec for the given peer address.
    pub fn with_metrics_label(mut self, metrics_label: String) -> Self {
        self.metrics_label = Some(metrics_label);
        self
    }
}

// ======== Encoding =========

impl Encoder<Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        use Error::Parse;
        // The header carries the body's length and checksum, so the body
        // has to exist before the header can be written.
        let mut body = Vec::new();
        self.write_body(&item, &mut body)?;

        if body.len() > self.builder.max_len {
            return Err(Parse("body length exceeded maximum size"));
        }

        if let Some(label) = self.builder.metrics_label.clone() {
            metrics::counter!("bytes.written", "addr" => label)
                .increment((body.len() + HEADER_LEN) as u64);
        }

        let command = item.command();
        trace!(?item, len = body.len());

        let mut header = [0u8; HEADER_LEN];
        let mut header_writer = Cursor::new(&mut header[..]);
        header_writer.write_all(&Magic::from(self.builder.network).0[..])?;
        header_writer.write_all(&command.bytes())?;
        header_writer.write_u32::<LittleEndian>(body.len() as u32)?;
        header_writer.write_all(&sha256d::Checksum::from(&body[..]).0)?;

        dst.reserve(HEADER_LEN + body.len());
        dst.extend_from_slice(&header);
        dst.extend_from_slice(&body);

        Ok(())
    }
}

impl Codec {
    /// Write the body of the message into the given writer. This allows writing
    /// the message body prior to writing the header, so that the header can
    /// contain a checksum of the message body.
    fn write_body<W: Write>(&self, msg: &Message, mut writer: W) -> Result<(), Error> {
        match msg {
            Message::Version(inner) => {
                inner.bitcoin_serialize(&mut writer)?;
            }
            Message::Verack => { /* Empty payload -- no-op */ }
            Message::Ping(nonce) => {
                nonce.bitcoin_serialize(&mut writer)?;
            }
            Message::Pong(nonce) => {
                nonce.bitcoin_serialize(&mut writer)?;
            }
            Message::Reject {
                message,
                ccode,
                reason,
                data,
            } => {
                message.bitcoin_serialize(&mut writer)?;
                writer.write_u8(*ccode as u8)?;
                reason.bitcoin_serialize(&mut writer)?;
                if let Some(data) = data {
                    writer.write_all(&data[..])?;
                }
            }
            Message::Addr(addrs) => addrs.bitcoin_serialize(&mut writer)?,
            Message::GetAddr => { /* Empty payload -- no-op */ }
            Message::GetBlocks(get_blocks) => {
                self.builder.version.bitcoin_serialize(&mut writer)?;
                get_blocks.bitcoin_serialize(&mut writer)?
            }
            Message::GetHeaders(get_headers) => {
                self.builder.version.bitcoin_serialize(&mut writer)?;
                get_headers.bitcoin_serialize(&mut writer)?
            }
            Message::Headers(headers) => headers.bitcoin_serialize(&mut writer)?,
            Message::Inv(hashes) => hashes.bitcoin_serialize(&mut writer)?,
            Message::Mempool => { /* Empty payload -- no-op */ }
            Message::SendHeaders => { /* Empty payload -- no-op */ }
        }
        Ok(())
    }
}

// ======== Decoding =========

enum DecodeState {
    Head,
    Body {
        body_len: usize,
        command: Command,
        checksum: sha256d::Checksum,
    },
}

impl fmt::Debug for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeState::Head => write!(f, "DecodeState::Head"),
            DecodeState::Body {
                body_len,
                command,
                checksum,
            } => f
                .debug_struct("DecodeState::Body")
                .field("body_len", &body_len)
                .field("command", &command)
                .field("checksum", &checksum)
                .finish(),
        }
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        use Error::Parse;
        match self.state {
            DecodeState::Head => {
                // First check that the src buffer contains an entire header.
                if src.len() < HEADER_LEN {
                    trace!(?self.state, "src buffer does not have an entire header, waiting");
                    // Signal that decoding requires more data.
                    return Ok(None);
                }

                // Now that we know that src contains a header, split off the header section.
                let header = src.split_to(HEADER_LEN);

                // Create a cursor over the header and parse its fields.
                let mut header_reader = Cursor::new(&header);
                let magic = Magic(<[u8; 4]>::bitcoin_deserialize(&mut header_reader)?);
                let command = Command::bitcoin_deserialize(&mut header_reader)?;
                let body_len = header_reader.read_u32::<LittleEndian>()? as usize;
                let checksum =
                    sha256d::Checksum(<[u8; 4]>::bitcoin_deserialize(&mut header_reader)?);
                trace!(
                    ?self.state,
                    ?magic,
                    %command,
                    body_len,
                    ?checksum,
                    "read header from src buffer"
                );

                if magic != Magic::from(self.builder.network) {
                    return Err(Parse("supplied magic did not meet expectations"));
                }
                if body_len > self.builder.max_len {
                    return Err(Parse("body length exceeded maximum size"));
                }

                if let Some(label) = self.builder.metrics_label.clone() {
                    metrics::counter!("bytes.read", "addr" => label)
                        .increment((body_len + HEADER_LEN) as u64);
                }

                // Reserve buffer space for the expected body and the following header.
                src.reserve(body_len + HEADER_LEN);

                self.state = DecodeState::Body {
                    body_len,
                    command,
                    checksum,
                };

                // Now that the state is updated, recurse to attempt body decoding.
                self.decode(src)
            }
            DecodeState::Body {
                body_len,
                command,
                checksum,
            } => {
                if src.len() < body_len {
                    // Need to wait for the full body
                    trace!(?self.state, len = src.len(), "src buffer does not have an entire body, waiting");
                    return Ok(None);
                }

                // Now that we know we have the full body, split off the body,
                // and reset the decoder state for the next message. Otherwise
                // we will attempt to read the next header as the current body.
                let body = src.split_to(body_len);
                self.state = DecodeState::Head;

                if checksum != sha256d::Checksum::from(&body[..]) {
                    return Err(Parse(
                        "supplied message checksum does not match computed checksum",
                    ));
                }

                let mut body_reader = Cursor::new(&body);
                // Convention: deserialize the message directly (using
                // `bitcoin_deserialize()`) unless it requires context from the
                // codec -- a negotiated version or a protocol size cap. In
                // that case, use the codec's self.read_* method.
                let msg = match command {
                    Command::Addr => Message::Addr(self.read_addrs(&mut body_reader)?),
                    Command::Version => {
                        Message::Version(Version::bitcoin_deserialize(&mut body_reader)?)
                    }
                    Command::Verack => Message::Verack,
                    Command::GetAddr => Message::GetAddr,
                    Command::GetBlocks => self.read_getblocks(&mut body_reader)?,
                    Command::GetHeaders => self.read_getheaders(&mut body_reader)?,
                    Command::Headers => Message::Headers(self.read_headers(&mut body_reader)?),
                    Command::Inv => Message::Inv(self.read_inv(&mut body_reader)?),
                    Command::MemPool => Message::Mempool,
                    Command::Ping => Message::Ping(Nonce::bitcoin_deserialize(&mut body_reader)?),
                    Command::Pong => Message::Pong(Nonce::bitcoin_deserialize(&mut body_reader)?),
                    Command::Reject => self.read_reject(&mut body_reader)?,
                    Command::SendHeaders => Message::SendHeaders,
                    Command::Alert => {
                        // alert is insecure and deprecated; skip the frame and
                        // keep decoding from the same buffer.
                        debug!("dropping alert message");
                        return self.decode(src);
                    }
                    Command::Unknown(_) => {
                        debug!(%command, "dropping message with unhandled command");
                        return self.decode(src);
                    }
                };
                trace!("finished message decoding");
                Ok(Some(msg))
            }
        }
    }
}

impl Codec {
    /// Read a var-int prefixed list, first enforcing the protocol's hard
    /// cap for the list in question.
    fn read_list<T: BitcoinDeserialize, R: Read>(
        &self,
        mut reader: R,
        cap: usize,
        what: &'static str,
    ) -> Result<Vec<T>, Error> {
        let count = CompactInt::bitcoin_deserialize(&mut reader)?.value();
        if count > cap as u64 {
            warn!(what, count, cap, "list count exceeds protocol limit");
            return Err(Error::Parse("list count exceeds protocol limit"));
        }
        let mut items = Vec::with_capacity(std::cmp::min(count as usize, 1024));
        for _ in 0..count {
            items.push(T::bitcoin_deserialize(&mut reader)?);
        }
        Ok(items)
    }

    fn read_addrs<R: Read>(&self, reader: R) -> Result<Vec<MetaAddr>, Error> {
        self.read_list(reader, constants::MAX_ADDRS_IN_MESSAGE, "addr")
    }

    fn read_headers<R: Read>(&self, reader: R) -> Result<Vec<block::CountedHeader>, Error> {
        self.read_list(reader, constants::MAX_HEADERS_IN_MESSAGE, "headers")
    }

    fn read_inv<R: Read>(&self, reader: R) -> Result<Vec<InventoryHash>, Error> {
        self.read_list(reader, constants::MAX_INV_IN_MESSAGE, "inv")
    }

    fn read_getblocks<R: Read>(&self, mut reader: R) -> Result<Message, Error> {
        // the sender's advertised version opens the payload; it is recorded
        // nowhere because this client drops getblocks after decoding
        let _version = ProtocolVersion::bitcoin_deserialize(&mut reader)?;
        let block_locator_hashes =
            self.read_list(&mut reader, constants::MAX_LOCATOR_HASHES, "getblocks")?;
        let stop_hash = read_stop_hash(&mut reader)?;
        Ok(Message::GetBlocks(GetBlocks {
            block_locator_hashes,
            stop_hash,
        }))
    }

    fn read_getheaders<R: Read>(&self, mut reader: R) -> Result<Message, Error> {
        let _version = ProtocolVersion::bitcoin_deserialize(&mut reader)?;
        let block_locator_hashes =
            self.read_list(&mut reader, constants::MAX_LOCATOR_HASHES, "getheaders")?;
        let stop_hash = read_stop_hash(&mut reader)?;
        Ok(Message::GetHeaders(GetHeaders {
            block_locator_hashes,
            stop_hash,
        }))
    }

    fn read_reject<R: Read>(&self, mut reader: R) -> Result<Message, Error> {
        let message = String::bitcoin_deserialize(&mut reader)?;
        let ccode = match reader.read_u8()? {
            0x01 => RejectReason::Malformed,
            0x10 => RejectReason::Invalid,
            0x11 => RejectReason::Obsolete,
            0x12 => RejectReason::Duplicate,
            0x40 => RejectReason::Nonstandard,
            0x41 => RejectReason::Dust,
            0x42 => RejectReason::InsufficientFee,
            0x43 => RejectReason::Checkpoint,
            0x50 => RejectReason::Other,
            _ => return Err(Error::Parse("invalid RejectReason value in ccode field")),
        };
        let reason = String::bitcoin_deserialize(&mut reader)?;

        // There's no length field for the trailing data; it is implicitly
        // encoded by the body length. Every known sender supplies either
        // nothing or the 32-byte hash of the rejected object.
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        let data = match rest.len() {
            0 => None,
            32 => {
                let mut data = [0u8; 32];
                data.copy_from_slice(&rest);
                Some(data)
            }
            _ => return Err(Error::Parse("unexpected data length in reject message")),
        };

        Ok(Message::Reject {
            message,
            ccode,
            reason,
            data,
        })
    }
}

/// Read the trailing stop hash of `getheaders`/`getblocks`, mapping the
/// all-zero "no stop" sentinel to `None`.
fn read_stop_hash<R: Read>(mut reader: R) -> Result<Option<block::Hash>, Error> {
    let raw = block::Hash::bitcoin_deserialize(&mut reader)?;
    if raw.is_zero() {
        Ok(None)
    } else {
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::magics;
    use chrono::{TimeZone, Utc};
    use futures::prelude::*;
    use spv_chain::block::{CountedHeader, Header};
    use spv_chain::parameters::genesis_header;
    use spv_chain::work::difficulty::CompactDifficulty;
    use tokio_util::codec::{FramedRead, FramedWrite};

    fn encode_to_vec(msg: Message) -> Vec<u8> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut bytes = Vec::new();
            {
                let mut fw = FramedWrite::new(&mut bytes, Codec::builder().finish());
                fw.send(msg).await.expect("message should be serialized");
            }
            bytes
        })
    }

    fn decode_from_slice(bytes: &[u8]) -> Option<Result<Message, Error>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let mut fr = FramedRead::new(Cursor::new(bytes), Codec::builder().finish());
            fr.next().await
        })
    }

    fn roundtrip(msg: Message) {
        let bytes = encode_to_vec(msg.clone());
        let parsed = decode_from_slice(&bytes)
            .expect("a next message should be available")
            .expect("that message should deserialize");
        assert_eq!(msg, parsed);
    }

    #[test]
    fn ping_golden_frame() {
        spv_test::init();

        let bytes = encode_to_vec(Message::Ping(Nonce(0x0123_4567_89AB_CDEF)));
        let expected: Vec<u8> = [
            // testnet3 magic
            &[0x0B, 0x11, 0x09, 0x07][..],
            // "ping" padded to 12 bytes
            &[0x70, 0x69, 0x6E, 0x67, 0, 0, 0, 0, 0, 0, 0, 0][..],
            // payload length
            &[0x08, 0x00, 0x00, 0x00][..],
            // checksum: first four bytes of SHA256d(payload)
            &[0x33, 0xBC, 0x15, 0xE5][..],
            // the nonce, little-endian
            &[0xEF, 0xCD, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01][..],
        ]
        .concat();
        assert_eq!(bytes, expected);

        let parsed = decode_from_slice(&bytes).unwrap().unwrap();
        assert_eq!(parsed, Message::Ping(Nonce(0x0123_4567_89AB_CDEF)));
    }

    #[test]
    fn version_message_round_trip() {
        spv_test::init();
        use std::net::{IpAddr, Ipv4Addr, SocketAddr};
        let services = PeerServices::NODE_NETWORK;

        roundtrip(Message::Version(Version::new(
            constants::CURRENT_VERSION,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 6)), 8333),
            services,
            services,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 6)), 8333),
            Nonce(0x9082_4908_8927_9238),
            "Beaver".to_owned(),
            block::Height(540_000),
            true,
        )));
    }

    #[test]
    fn empty_payload_messages_round_trip() {
        spv_test::init();
        for msg in &[
            Message::Verack,
            Message::GetAddr,
            Message::Mempool,
            Message::SendHeaders,
        ] {
            roundtrip(msg.clone());
        }
    }

    #[test]
    fn addr_message_round_trip() {
        spv_test::init();
        roundtrip(Message::Addr(vec![
            MetaAddr {
                last_seen: Utc.timestamp_opt(1_573_342_000, 0).unwrap(),
                services: PeerServices::NODE_NETWORK,
                addr: "203.0.113.6:18333".parse().unwrap(),
            },
            MetaAddr {
                last_seen: Utc.timestamp_opt(1_573_342_100, 0).unwrap(),
                services: PeerServices::empty(),
                addr: "[2001:db8::7]:18333".parse().unwrap(),
            },
        ]));
    }

    #[test]
    fn getheaders_message_round_trip() {
        spv_test::init();
        roundtrip(Message::GetHeaders(GetHeaders {
            block_locator_hashes: vec![genesis_header(Network::Testnet).hash()],
            stop_hash: None,
        }));
        roundtrip(Message::GetHeaders(GetHeaders {
            block_locator_hashes: vec![block::Hash([0x22; 32])],
            stop_hash: Some(block::Hash([0x44; 32])),
        }));
    }

    #[test]
    fn reject_message_round_trip() {
        spv_test::init();
        roundtrip(Message::Reject {
            message: "getheaders".to_owned(),
            ccode: RejectReason::Obsolete,
            reason: "version too old".to_owned(),
            data: None,
        });
        roundtrip(Message::Reject {
            message: "headers".to_owned(),
            ccode: RejectReason::Invalid,
            reason: "bad header".to_owned(),
            data: Some([0x17; 32]),
        });
    }

    fn synthetic_headers(count: usize) -> Vec<CountedHeader> {
        let mut parent = genesis_header(Network::Testnet);
        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let header = Header::new(
                1,
                parent.hash(),
                spv_chain::block::merkle::Root([(i % 251) as u8; 32]),
                Utc.timestamp_opt(1_296_688_602 + i as i64, 0).unwrap(),
                CompactDifficulty(0x1d00_ffff),
                i as u32,
            );
            headers.push(CountedHeader {
                header,
                transaction_count: 0,
            });
            parent = header;
        }
        headers
    }

    #[test]
    fn headers_at_the_cap_are_accepted() {
        spv_test::init();
        roundtrip(Message::Headers(synthetic_headers(
            constants::MAX_HEADERS_IN_MESSAGE,
        )));
    }

    #[test]
    fn headers_over_the_cap_are_rejected() {
        spv_test::init();
        let bytes = encode_to_vec(Message::Headers(synthetic_headers(
            constants::MAX_HEADERS_IN_MESSAGE + 1,
        )));
        decode_from_slice(&bytes)
            .expect("a next message should be available")
            .expect_err("an oversized headers message should not deserialize");
    }

    #[test]
    fn unknown_commands_are_skipped() {
        spv_test::init();

        // a frame with a valid header but a command this client never
        // handles, followed by a ping
        let payload = [0u8; 2];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&magics::TESTNET3);
        bytes.extend_from_slice(b"feefilter\0\0\0");
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&sha256d::Checksum::from(&payload[..]).0);
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&encode_to_vec(Message::Ping(Nonce(7))));

        let parsed = decode_from_slice(&bytes)
            .expect("a next message should be available")
            .expect("the following ping should deserialize");
        assert_eq!(parsed, Message::Ping(Nonce(7)));
    }

    #[test]
    fn wrong_magic_is_an_error() {
        spv_test::init();
        let mut bytes = encode_to_vec(Message::Verack);
        bytes[0] ^= 0xFF;
        decode_from_slice(&bytes)
            .expect("a next message should be available")
            .expect_err("a frame with foreign magic should not deserialize");
    }

    #[test]
    fn corrupted_checksum_is_an_error() {
        spv_test::init();
        let mut bytes = encode_to_vec(Message::Ping(Nonce(1)));
        // flip a payload bit so the checksum no longer matches
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        decode_from_slice(&bytes)
            .expect("a next message should be available")
            .expect_err("a corrupted frame should not deserialize");
    }

    #[test]
    fn partial_frames_wait_for_more_data() {
        spv_test::init();
        let bytes = encode_to_vec(Message::Ping(Nonce(1)));

        let mut codec = Codec::builder().finish();
        let mut buf = BytesMut::from(&bytes[..HEADER_LEN + 2]);
        assert!(matches!(codec.decode(&mut buf), Ok(None)));

        // feeding the rest completes the frame
        buf.extend_from_slice(&bytes[HEADER_LEN + 2..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg, Message::Ping(Nonce(1)));
    }
}
