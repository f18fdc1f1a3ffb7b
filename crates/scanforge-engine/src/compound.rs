//! The compound command state machine.
//!
//! Every exchange with a compound-generation device runs through the same
//! cycle:
//!
//! ```text
//! Idle → Sending → AwaitingReply → DecodingStatus → FetchingPayload → Dispatch
//!   ↑                                                                   │
//!   └──────────────── busy? bounded delay, re-send ─────────────────────┘
//! ```
//!
//! The device reports transient busy/warming-up conditions through the
//! status area; the machine re-issues the pending request after a bounded
//! delay rather than surfacing them, up to a poll limit after which the
//! condition is terminal. `finish` is the only way to release the held
//! channel: the typed operations all borrow the machine, and
//! [`Compound::finish`] consumes it and hands the channel back.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use scanforge_channel::Channel;
use scanforge_core::constants::{
    BUSY_POLL_DELAY_MS, BUSY_POLL_LIMIT, HEADER_SIZE, REPLY_BLOCK_SIZE,
};
use scanforge_core::{Error, Fault, Quad, Result};
use scanforge_protocol::token::{err, request, status as stag};
use scanforge_protocol::{
    Capabilities, HardwareStatus, Header, Information, MechanicsAction, Parameters, Status,
};

/// Phase of the request/reply cycle, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundState {
    /// No transaction in flight.
    Idle,
    /// Request header and payload are being written.
    Sending,
    /// Waiting for the fixed-size reply block.
    AwaitingReply,
    /// Reply block received, status area being decoded.
    DecodingStatus,
    /// Reply indicated a data payload; reading it.
    FetchingPayload,
    /// Reply complete, routing it to the per-request decode hook.
    Dispatch,
    /// `finish` completed; the channel has been released.
    Finished,
}

impl fmt::Display for CompoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompoundState::Idle => "Idle",
            CompoundState::Sending => "Sending",
            CompoundState::AwaitingReply => "AwaitingReply",
            CompoundState::DecodingStatus => "DecodingStatus",
            CompoundState::FetchingPayload => "FetchingPayload",
            CompoundState::Dispatch => "Dispatch",
            CompoundState::Finished => "Finished",
        };
        write!(f, "{}", name)
    }
}

/// One complete reply: echoed header, decoded status, data payload.
#[derive(Debug, Clone)]
pub struct Reply {
    pub header: Header,
    pub status: Status,
    pub payload: Bytes,
    /// The raw 64-byte reply block, kept for pass-through consumers.
    pub raw_block: Bytes,
}

/// The compound command machine over one exclusively-owned channel.
pub struct Compound<C: Channel> {
    channel: Option<C>,
    state: CompoundState,
}

impl<C: Channel> Compound<C> {
    /// Take exclusive ownership of a channel.
    pub fn new(channel: C) -> Self {
        Compound {
            channel: Some(channel),
            state: CompoundState::Idle,
        }
    }

    /// Current machine phase.
    #[must_use]
    pub fn state(&self) -> CompoundState {
        self.state
    }

    fn set_state(&mut self, next: CompoundState) {
        trace!(from = %self.state, to = %next, "compound transition");
        self.state = next;
    }

    /// Drive one request through the machine and return its reply.
    ///
    /// Busy and warming-up conditions are retried internally with a
    /// bounded delay. Terminal conditions surface as errors:
    /// forever-busy, device in use by another client, authentication or
    /// permission faults, and protocol-shape violations.
    pub async fn transact(&mut self, code: Quad, payload: &[u8]) -> Result<Reply> {
        if self.channel.is_none() {
            return Err(Error::SessionFinished);
        }

        let mut busy_polls: u32 = 0;
        loop {
            self.set_state(CompoundState::Sending);
            if let Err(e) = self.send_request(code, payload).await {
                // transport failures are always fatal, never retried
                self.set_state(CompoundState::Idle);
                self.channel = None;
                return Err(e);
            }

            self.set_state(CompoundState::AwaitingReply);
            let reply = match self.read_reply(code).await {
                Ok(reply) => reply,
                Err(e) => {
                    // protocol-shape errors abort the session; soft
                    // recovery errors leave it usable
                    if e.is_fatal() {
                        self.set_state(CompoundState::Idle);
                        self.channel = None;
                    }
                    return Err(e);
                }
            };

            for violation in reply.status.validate(code) {
                warn!(request = %code, %violation, "status validation violation");
            }

            if reply.status.is_busy() {
                if busy_polls >= BUSY_POLL_LIMIT {
                    self.set_state(CompoundState::Idle);
                    return Err(Error::ForeverBusy {
                        attempts: busy_polls,
                    });
                }
                busy_polls += 1;
                debug!(request = %code, poll = busy_polls, "device busy, re-polling");
                tokio::time::sleep(Duration::from_millis(BUSY_POLL_DELAY_MS)).await;
                continue;
            }

            if reply.status.is_in_use() {
                self.set_state(CompoundState::Idle);
                return Err(Error::DeviceInUse);
            }

            if reply.status.has_error(err::WHAT_AUTH_REQUIRED) {
                self.set_state(CompoundState::Idle);
                return Err(Error::DeviceFault(Fault::AuthenticationRequired));
            }
            if reply.status.has_error(err::WHAT_PERMISSION) {
                self.set_state(CompoundState::Idle);
                return Err(Error::DeviceFault(Fault::PermissionRequired));
            }

            self.set_state(CompoundState::Dispatch);
            self.set_state(CompoundState::Idle);
            return Ok(reply);
        }
    }

    async fn send_request(&mut self, code: Quad, payload: &[u8]) -> Result<()> {
        let header = Header::new(code, payload.len() as u32)?;
        let channel = self.channel.as_mut().ok_or(Error::SessionFinished)?;
        channel.send(&header.encode()).await?;
        if !payload.is_empty() {
            channel.send(payload).await?;
        }
        Ok(())
    }

    async fn read_reply(&mut self, expected: Quad) -> Result<Reply> {
        let channel = self.channel.as_mut().ok_or(Error::SessionFinished)?;

        let mut block = [0u8; REPLY_BLOCK_SIZE];
        channel.recv(&mut block).await?;

        let header = Header::decode(&block[..HEADER_SIZE])?;
        if header.code != request::IMAGE && header.size % 4 != 0 {
            warn!(reply = %header.code, size = header.size, "non-image reply size not a multiple of 4");
        }

        self.set_state(CompoundState::DecodingStatus);
        let status = Status::decode(&block[HEADER_SIZE..])?;

        // recovery hook for mis-sequenced requests: log and keep the
        // session alive, unless the device no longer honors finish:
        // then nothing can release the channel and the protocol is broken
        if header.code == request::UNKNOWN {
            if expected == request::FINISH {
                error!("device rejected finish as unknown");
                return Err(Error::ProtocolViolation {
                    message: "finish rejected as unknown request".into(),
                });
            }
            warn!(request = %expected, "device did not recognize request");
            return Err(Error::UnknownRequest {
                request: expected.to_string(),
            });
        }
        if header.code == request::INVALID {
            if expected == request::FINISH {
                error!("device rejected finish as invalid");
                return Err(Error::ProtocolViolation {
                    message: "finish rejected as invalid request".into(),
                });
            }
            warn!(request = %expected, "request not valid in current device state");
            return Err(Error::InvalidRequest {
                request: expected.to_string(),
            });
        }
        if header.code != expected {
            return Err(Error::ProtocolViolation {
                message: format!("reply code {} for request {}", header.code, expected),
            });
        }

        let payload = if header.size > 0 {
            self.set_state(CompoundState::FetchingPayload);
            let channel = self.channel.as_mut().ok_or(Error::SessionFinished)?;
            let mut data = vec![0u8; header.size as usize];
            channel.recv(&mut data).await?;
            Bytes::from(data)
        } else {
            Bytes::new()
        };

        Ok(Reply {
            header,
            status,
            payload,
            raw_block: Bytes::copy_from_slice(&block),
        })
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// Read the static device information block.
    pub async fn get_information(&mut self) -> Result<Information> {
        let reply = self.transact(request::INFORMATION, &[]).await?;
        Information::decode(&reply.payload)
    }

    /// Read capabilities for both sides, or the flip side only.
    pub async fn get_capabilities(&mut self, flip: bool) -> Result<Capabilities> {
        let code = if flip {
            request::CAPABILITIES_FLIP
        } else {
            request::CAPABILITIES
        };
        let reply = self.transact(code, &[]).await?;
        Capabilities::decode(&reply.payload)
    }

    /// Restrict the device's advertised capabilities.
    pub async fn set_capabilities(&mut self, caps: &Capabilities, flip: bool) -> Result<()> {
        let code = if flip {
            request::CAPABILITIES_FLIP
        } else {
            request::CAPABILITIES
        };
        let mut payload = BytesMut::new();
        caps.encode(&mut payload)?;
        self.transact(code, &payload).await?;
        Ok(())
    }

    /// Read the full current parameter set.
    pub async fn get_parameters(&mut self, flip: bool) -> Result<Parameters> {
        let code = if flip {
            request::GET_PARAMETERS_FLIP
        } else {
            request::GET_PARAMETERS
        };
        let reply = self.transact(code, &[]).await?;
        Parameters::decode(&reply.payload)
    }

    /// Read only the named parameters.
    ///
    /// The reply carries exactly the requested tokens; everything else in
    /// the returned set stays unset.
    pub async fn get_parameters_subset(
        &mut self,
        tokens: &[Quad],
        flip: bool,
    ) -> Result<Parameters> {
        let code = if flip {
            request::GET_PARAMETERS_FLIP
        } else {
            request::GET_PARAMETERS
        };
        let mut payload = BytesMut::with_capacity(tokens.len() * 4);
        for token in tokens {
            payload.extend_from_slice(token.as_bytes());
        }
        let reply = self.transact(code, &payload).await?;
        Parameters::decode(&reply.payload)
    }

    /// Send a full parameter set.
    ///
    /// # Errors
    /// Returns `Error::ParametersRejected` when the device answers with a
    /// failed parameter result.
    pub async fn set_parameters(&mut self, params: &Parameters, flip: bool) -> Result<()> {
        params.validate()?;
        let code = if flip {
            request::SET_PARAMETERS_FLIP
        } else {
            request::SET_PARAMETERS
        };
        let mut payload = BytesMut::new();
        params.encode(&mut payload)?;
        let reply = self.transact(code, &payload).await?;
        match reply.status.parameter_result {
            Some(stag::PAR_OK) | None => Ok(()),
            Some(_) => Err(Error::ParametersRejected),
        }
    }

    /// Read the transient hardware status.
    pub async fn get_status(&mut self) -> Result<HardwareStatus> {
        let reply = self.transact(request::STATUS, &[]).await?;
        HardwareStatus::decode(&reply.payload)
    }

    /// Run a vendor extension payload and return the raw reply.
    pub async fn run_extension(&mut self, payload: &[u8]) -> Result<Reply> {
        self.transact(request::EXTENSION, payload).await
    }

    /// Issue a mechanics action.
    pub async fn mechanics(&mut self, action: MechanicsAction) -> Result<()> {
        let mut payload = BytesMut::new();
        action.encode(&mut payload)?;
        self.transact(request::MECHANICS, &payload).await?;
        Ok(())
    }

    /// Run the `finish` exchange and release the channel.
    ///
    /// This is the only way to end a compound session cleanly; the device
    /// stays claimed until it sees the finish request.
    pub async fn finish(mut self) -> Result<C> {
        self.transact(request::FINISH, &[]).await?;
        self.set_state(CompoundState::Finished);
        self.channel.take().ok_or(Error::SessionFinished)
    }
}

impl<C: Channel> Drop for Compound<C> {
    fn drop(&mut self) {
        if self.channel.is_some() {
            // cannot issue I/O here; the device stays claimed until it
            // times the connection out
            warn!("compound session dropped without finish");
        }
    }
}

impl<C: Channel> fmt::Debug for Compound<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compound")
            .field("state", &self.state)
            .field("finished", &self.channel.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use pretty_assertions::assert_eq;
    use scanforge_channel::MockChannel;
    use scanforge_protocol::format;
    use scanforge_protocol::token::{info, source};

    use crate::testutil::reply_block;

    fn busy_status() -> Vec<u8> {
        let mut s = Vec::new();
        s.extend_from_slice(stag::NOT_READY.as_bytes());
        s.extend_from_slice(stag::NRD_BUSY.as_bytes());
        s
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CompoundState::AwaitingReply).unwrap();
        assert_eq!(json, "\"awaiting_reply\"");

        let back: CompoundState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CompoundState::AwaitingReply);
    }

    #[tokio::test]
    async fn test_get_information() {
        let mut payload = BytesMut::new();
        payload.put_slice(source::ADF.as_bytes());
        format::put_blob(&mut payload, b"DPLX").unwrap();
        payload.put_slice(info::PRODUCT.as_bytes());
        format::put_blob(&mut payload, b"PX-1400").unwrap();

        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::INFORMATION, &payload, &[]));

        let mut machine = Compound::new(channel);
        let information = machine.get_information().await.unwrap();
        assert_eq!(information.product.as_deref(), Some("PX-1400"));
        assert!(information.adf.unwrap().supports_duplex());
    }

    #[tokio::test]
    async fn test_request_wire_form() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::STATUS, &[], &[]));

        let mut machine = Compound::new(channel);
        let _ = machine.transact(request::STATUS, &[]).await.unwrap();

        // 12-byte header, no payload
        assert_eq!(machine.channel.as_ref().unwrap().sent()[0], &b"STAT00000000"[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_reply_is_retried() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::STATUS, &[], &busy_status()));
        channel.queue(&reply_block(request::STATUS, &[], &[]));

        let mut machine = Compound::new(channel);
        let reply = machine.transact(request::STATUS, &[]).await.unwrap();
        assert!(!reply.status.is_busy());

        // request went out twice
        let sent = machine.channel.as_ref().unwrap().sent().len();
        assert_eq!(sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forever_busy_is_terminal() {
        let mut channel = MockChannel::new();
        for _ in 0..=BUSY_POLL_LIMIT {
            channel.queue(&reply_block(request::STATUS, &[], &busy_status()));
        }

        let mut machine = Compound::new(channel);
        let result = machine.transact(request::STATUS, &[]).await;
        assert!(matches!(result, Err(Error::ForeverBusy { .. })));
    }

    #[tokio::test]
    async fn test_in_use_is_surfaced_not_retried() {
        let mut status = Vec::new();
        status.extend_from_slice(stag::NOT_READY.as_bytes());
        status.extend_from_slice(stag::NRD_RESERVED.as_bytes());

        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::START_SCAN, &[], &status));

        let mut machine = Compound::new(channel);
        let result = machine.transact(request::START_SCAN, &[]).await;
        assert!(matches!(result, Err(Error::DeviceInUse)));

        // exactly one request went out
        assert_eq!(machine.channel.as_ref().unwrap().sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_request_is_recoverable() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::UNKNOWN, &[], &[]));
        channel.queue(&reply_block(request::STATUS, &[], &[]));

        let mut machine = Compound::new(channel);
        let result = machine.transact(request::EXTENSION, &[]).await;
        assert!(matches!(result, Err(Error::UnknownRequest { .. })));

        // the session is still usable afterwards
        machine.transact(request::STATUS, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_reply_to_finish_is_fatal() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::UNKNOWN, &[], &[]));

        let machine = Compound::new(channel);
        let result = machine.finish().await;
        assert!(matches!(result, Err(Error::ProtocolViolation { .. })));
    }

    #[tokio::test]
    async fn test_finish_releases_channel() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::FINISH, &[], &[]));

        let machine = Compound::new(channel);
        let channel = machine.finish().await.unwrap();
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_use_after_finish_fails() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::FINISH, &[], &[]));

        let machine = Compound::new(channel);
        let _ = machine.finish().await.unwrap();
        // machine is consumed; a fresh one with no channel reports finished
        let mut dead: Compound<MockChannel> = Compound {
            channel: None,
            state: CompoundState::Finished,
        };
        let result = dead.transact(request::STATUS, &[]).await;
        assert!(matches!(result, Err(Error::SessionFinished)));
    }

    #[tokio::test]
    async fn test_mismatched_reply_code_aborts_session() {
        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::IMAGE, &[], &[]));

        let mut machine = Compound::new(channel);
        let result = machine.transact(request::STATUS, &[]).await;
        assert!(matches!(result, Err(Error::ProtocolViolation { .. })));

        // aborted sessions fail fast from then on
        let result = machine.transact(request::STATUS, &[]).await;
        assert!(matches!(result, Err(Error::SessionFinished)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let mut channel = MockChannel::new();
        channel.fail_next_recv();

        let mut machine = Compound::new(channel);
        let result = machine.transact(request::STATUS, &[]).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_set_parameters_rejected() {
        let mut status = Vec::new();
        status.extend_from_slice(stag::PARAMETER_RESULT.as_bytes());
        status.extend_from_slice(stag::PAR_FAIL.as_bytes());

        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::SET_PARAMETERS, &[], &status));

        let mut params = Parameters::default();
        params.set_source(scanforge_core::DocumentSource::Flatbed, vec![]);

        let mut machine = Compound::new(channel);
        let result = machine.set_parameters(&params, false).await;
        assert!(matches!(result, Err(Error::ParametersRejected)));
    }

    #[tokio::test]
    async fn test_parameter_subset_request_payload() {
        let mut reply_payload = BytesMut::new();
        reply_payload.put_slice(source::ADF.as_bytes());
        format::put_blob(&mut reply_payload, b"DPLX").unwrap();

        let mut channel = MockChannel::new();
        channel.queue(&reply_block(request::GET_PARAMETERS, &reply_payload, &[]));

        let mut machine = Compound::new(channel);
        let params = machine
            .get_parameters_subset(&[source::ADF], false)
            .await
            .unwrap();

        // the request payload is the bare token list
        let sent = machine.channel.as_ref().unwrap().sent();
        assert_eq!(&sent[1][..], source::ADF.as_bytes());

        // only the requested field is populated
        let mut expected = Parameters::default();
        expected.adf = Some(vec![source::FLAG_DUPLEX]);
        assert_eq!(params, expected);
    }
}
