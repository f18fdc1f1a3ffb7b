//! Device handle registry and protocol routing.
//!
//! OPEN claims a device and decides which machine will speak for it, from
//! the generation prefix of the device spec (`compound:` or `legacy:`).
//! NATIVE records then carry raw protocol bytes: for a compound handle
//! they are an envelope plus payload driven through the [`Compound`]
//! machine; for a legacy handle they are opcode bytes run through the
//! [`LegacyMachine`] shape predictor, which also decides when the device
//! must not be touched at all.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use scanforge_channel::Channel;
use scanforge_core::constants::{HEADER_SIZE, NAK};
use scanforge_engine::{Compound, LegacyDirective, LegacyMachine};
use scanforge_protocol::Header;

use crate::error::{BridgeError, Result};
use crate::message::{BridgeRecord, RequestKind, STATUS_NG, STATUS_OK};

/// Protocol generation a device was opened as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Token-based compound protocol.
    Compound,
    /// Byte-opcode legacy protocol.
    Legacy,
}

/// Opens byte channels for device specs.
///
/// The bridge does not know how devices are reached; the host wires in a
/// connector for whatever transport it uses.
pub trait Connector {
    type Chan: Channel;

    async fn connect(&mut self, target: &str) -> Result<Self::Chan>;
}

enum Handle<C: Channel> {
    Compound(Compound<C>),
    Legacy { machine: LegacyMachine, channel: C },
}

/// The request router: one instance serves one host connection.
pub struct Bridge<N: Connector> {
    connector: N,
    handles: HashMap<u32, Handle<N::Chan>>,
}

impl<N: Connector> Bridge<N> {
    pub fn new(connector: N) -> Self {
        Bridge {
            connector,
            handles: HashMap::new(),
        }
    }

    /// Number of currently open device handles.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Handle one host request and produce its reply record.
    ///
    /// Failures never escape as errors: the host always gets a reply, NG
    /// with an empty payload when something went wrong.
    pub async fn handle_request(&mut self, request: BridgeRecord) -> BridgeRecord {
        match self.dispatch(&request).await {
            Ok(payload) => BridgeRecord::reply(&request, STATUS_OK, payload),
            Err(e) => {
                warn!(id = request.id, error = %e, "bridge request failed");
                BridgeRecord::reply(&request, STATUS_NG, Bytes::new())
            }
        }
    }

    async fn dispatch(&mut self, request: &BridgeRecord) -> Result<Bytes> {
        match RequestKind::from_u32(request.kind)? {
            RequestKind::Open => self.open(request).await,
            RequestKind::Close => self.close(request).await,
            RequestKind::Native => self.native(request).await,
        }
    }

    async fn open(&mut self, request: &BridgeRecord) -> Result<Bytes> {
        if self.handles.contains_key(&request.id) {
            return Err(BridgeError::DuplicateHandle(request.id));
        }
        let spec = std::str::from_utf8(&request.payload)
            .map_err(|_| BridgeError::BadDeviceSpec("device spec is not UTF-8".into()))?;
        let (generation, target) = parse_spec(spec)?;

        debug!(id = request.id, ?generation, target, "opening device");
        let channel = self.connector.connect(target).await?;
        let handle = match generation {
            Generation::Compound => Handle::Compound(Compound::new(channel)),
            Generation::Legacy => Handle::Legacy {
                machine: LegacyMachine::new(),
                channel,
            },
        };
        self.handles.insert(request.id, handle);
        Ok(Bytes::new())
    }

    async fn close(&mut self, request: &BridgeRecord) -> Result<Bytes> {
        let handle = self
            .handles
            .remove(&request.id)
            .ok_or(BridgeError::UnknownHandle(request.id))?;
        if let Handle::Compound(machine) = handle {
            // release the device; legacy channels just drop
            machine.finish().await?;
        }
        debug!(id = request.id, "closed device");
        Ok(Bytes::new())
    }

    async fn native(&mut self, request: &BridgeRecord) -> Result<Bytes> {
        let handle = self
            .handles
            .get_mut(&request.id)
            .ok_or(BridgeError::UnknownHandle(request.id))?;
        match handle {
            Handle::Compound(machine) => submit_compound(machine, &request.payload).await,
            Handle::Legacy { machine, channel } => {
                submit_legacy(machine, channel, &request.payload).await
            }
        }
    }
}

fn parse_spec(spec: &str) -> Result<(Generation, &str)> {
    if let Some(target) = spec.strip_prefix("compound:") {
        Ok((Generation::Compound, target))
    } else if let Some(target) = spec.strip_prefix("legacy:") {
        Ok((Generation::Legacy, target))
    } else {
        Err(BridgeError::BadDeviceSpec(spec.to_string()))
    }
}

/// Drive raw compound protocol bytes through the machine.
///
/// The payload is one envelope plus request payload; the reply is the raw
/// reply block followed by any data payload, exactly as the host expects
/// them off the wire.
async fn submit_compound<C: Channel>(machine: &mut Compound<C>, raw: &[u8]) -> Result<Bytes> {
    let header = Header::decode(raw)?;
    let payload = &raw[HEADER_SIZE..];
    if payload.len() != header.size as usize {
        return Err(BridgeError::Protocol(
            scanforge_core::Error::MalformedRecord {
                message: format!(
                    "native record announces {} payload bytes, carries {}",
                    header.size,
                    payload.len()
                ),
            },
        ));
    }

    let reply = machine.transact(header.code, payload).await?;
    let mut out = BytesMut::with_capacity(reply.raw_block.len() + reply.payload.len());
    out.put_slice(&reply.raw_block);
    out.put_slice(&reply.payload);
    Ok(out.freeze())
}

/// Run one host submission through the legacy shape predictor.
async fn submit_legacy<C: Channel>(
    machine: &mut LegacyMachine,
    channel: &mut C,
    bytes: &[u8],
) -> Result<Bytes> {
    let mut out = BytesMut::new();
    let mut directive = machine.on_command(bytes);
    loop {
        match directive {
            LegacyDirective::Nak => {
                // unsupported command: answer without touching the device
                out.put_u8(NAK);
                break;
            }
            LegacyDirective::Done | LegacyDirective::ExpectBlock { .. } => break,
            LegacyDirective::Forward { reply_size } => {
                channel.send(bytes).await?;
                if reply_size == 0 {
                    break;
                }
                let mut reply = vec![0u8; reply_size];
                channel.recv(&mut reply).await?;
                out.put_slice(&reply);
                directive = machine.on_reply(&reply);
            }
            LegacyDirective::Read { size } => {
                let mut reply = vec![0u8; size];
                channel.recv(&mut reply).await?;
                out.put_slice(&reply);
                directive = machine.on_reply(&reply);
            }
        }
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanforge_channel::MockChannel;
    use scanforge_core::Quad;
    use scanforge_core::constants::{ESC, REPLY_BLOCK_SIZE};
    use scanforge_protocol::token::request;

    struct MockConnector {
        channels: Vec<MockChannel>,
    }

    impl Connector for MockConnector {
        type Chan = MockChannel;

        async fn connect(&mut self, _target: &str) -> Result<MockChannel> {
            self.channels
                .pop()
                .ok_or_else(|| BridgeError::BadDeviceSpec("no scripted channel".into()))
        }
    }

    fn reply_block(code: Quad, payload: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&Header::new(code, payload.len() as u32).unwrap().encode());
        block.resize(REPLY_BLOCK_SIZE, 0);
        block.extend_from_slice(payload);
        block
    }

    fn open_record(id: u32, spec: &str) -> BridgeRecord {
        BridgeRecord::request(id, RequestKind::Open, Bytes::copy_from_slice(spec.as_bytes()))
    }

    #[tokio::test]
    async fn test_open_and_native_compound() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::STATUS, b"PB  d003"));

        let mut bridge = Bridge::new(MockConnector {
            channels: vec![channel],
        });

        let reply = bridge.handle_request(open_record(1, "compound:usb:04b8")).await;
        assert!(reply.is_ok());
        assert_eq!(bridge.open_handles(), 1);

        // raw STAT envelope with no payload
        let native = BridgeRecord::request(
            1,
            RequestKind::Native,
            Bytes::copy_from_slice(&Header::new(request::STATUS, 0).unwrap().encode()),
        );
        let reply = bridge.handle_request(native).await;
        assert!(reply.is_ok());
        // raw reply block plus the 8-byte payload
        assert_eq!(reply.payload.len(), REPLY_BLOCK_SIZE + 8);
        assert_eq!(&reply.payload[..4], b"STAT");
    }

    #[tokio::test]
    async fn test_native_on_unknown_handle_is_ng() {
        let mut bridge = Bridge::new(MockConnector { channels: vec![] });

        let native = BridgeRecord::request(9, RequestKind::Native, Bytes::new());
        let reply = bridge.handle_request(native).await;
        assert!(!reply.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_open_is_ng() {
        let mut bridge = Bridge::new(MockConnector {
            channels: vec![MockChannel::new(), MockChannel::new()],
        });

        assert!(bridge.handle_request(open_record(1, "legacy:dev")).await.is_ok());
        let reply = bridge.handle_request(open_record(1, "legacy:dev")).await;
        assert!(!reply.is_ok());
        assert_eq!(bridge.open_handles(), 1);
    }

    #[tokio::test]
    async fn test_bad_spec_is_ng() {
        let mut bridge = Bridge::new(MockConnector {
            channels: vec![MockChannel::new()],
        });
        let reply = bridge.handle_request(open_record(1, "serial:dev")).await;
        assert!(!reply.is_ok());
        assert_eq!(bridge.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_legacy_unsupported_command_naks_without_transport() {
        let mut bridge = Bridge::new(MockConnector {
            channels: vec![MockChannel::new()],
        });
        bridge.handle_request(open_record(2, "legacy:dev")).await;

        let native = BridgeRecord::request(
            2,
            RequestKind::Native,
            Bytes::from_static(&[ESC, b'Q']),
        );
        let reply = bridge.handle_request(native).await;
        assert!(reply.is_ok());
        assert_eq!(&reply.payload[..], &[NAK]);

        // the device never saw a byte
        let Handle::Legacy { channel, .. } = &bridge.handles[&2] else {
            panic!("expected a legacy handle");
        };
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_status_command_relays_reply() {
        let mut channel = MockChannel::new();
        channel.queue(&[0x04]);

        let mut bridge = Bridge::new(MockConnector {
            channels: vec![channel],
        });
        bridge.handle_request(open_record(2, "legacy:dev")).await;

        let native = BridgeRecord::request(
            2,
            RequestKind::Native,
            Bytes::from_static(&[ESC, b'F']),
        );
        let reply = bridge.handle_request(native).await;
        assert!(reply.is_ok());
        assert_eq!(&reply.payload[..], &[0x04]);
    }

    #[tokio::test]
    async fn test_legacy_image_round_is_one_submission() {
        let mut channel = MockChannel::new();
        // block info announcing 8 final bytes, then the data
        channel.queue(&[0x20, 0x00, 0x08, 0x00]);
        channel.queue(b"IMAGEDAT");

        let mut bridge = Bridge::new(MockConnector {
            channels: vec![channel],
        });
        bridge.handle_request(open_record(3, "legacy:dev")).await;

        let native = BridgeRecord::request(
            3,
            RequestKind::Native,
            Bytes::from_static(&[ESC, b'G']),
        );
        let reply = bridge.handle_request(native).await;
        assert!(reply.is_ok());
        assert_eq!(&reply.payload[..4], &[0x20, 0x00, 0x08, 0x00]);
        assert_eq!(&reply.payload[4..], b"IMAGEDAT");
    }

    #[tokio::test]
    async fn test_close_compound_issues_finish() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::FINISH, &[]));

        let mut bridge = Bridge::new(MockConnector {
            channels: vec![channel],
        });
        bridge.handle_request(open_record(1, "compound:usb")).await;

        let close = BridgeRecord::request(1, RequestKind::Close, Bytes::new());
        let reply = bridge.handle_request(close).await;
        assert!(reply.is_ok());
        assert_eq!(bridge.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_close_unknown_handle_is_ng() {
        let mut bridge = Bridge::new(MockConnector { channels: vec![] });
        let close = BridgeRecord::request(8, RequestKind::Close, Bytes::new());
        assert!(!bridge.handle_request(close).await.is_ok());
    }
}
