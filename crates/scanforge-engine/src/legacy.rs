//! Reply-shape predictor for the legacy byte-opcode device generation.
//!
//! Older devices speak two-byte escape commands instead of the compound
//! token protocol. The bridge relays those commands verbatim; what it
//! needs from the engine is purely *shape* knowledge: given a command,
//! how many reply bytes to read, whether a parameter block follows, and
//! when an image transfer is over. This machine is that table plus the
//! handshake states around it. It never looks at image content, only at
//! byte counts, status bits, and the ACK/NAK bytes of the handshake.
//!
//! The driver of the machine owns the transport. Each [`LegacyDirective`]
//! tells it what to do next; it reports device bytes back through
//! [`LegacyMachine::on_reply`] and host bytes through
//! [`LegacyMachine::on_command`]. Unsupported commands are answered with
//! a single NAK and the transport is never touched.

use scanforge_core::constants::{ACK, ESC, FF, NAK};
use tracing::{debug, warn};

/// End-of-image bit in a block-info status byte.
const IMAGE_END_BIT: u8 = 0x20;

/// End bit in the trailing byte of an extended relay block.
const BLOCK_END_BIT: u8 = 0x80;

/// Size of a block-info header: status, error, 16-bit data count.
const BLOCK_INFO_SIZE: usize = 4;

/// Size of an extended block-info header: status, error, 16-bit block
/// size, 16-bit block count.
const EXTENDED_INFO_SIZE: usize = 6;

/// What the driver of the machine must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyDirective {
    /// Forward the submitted bytes to the device, then read `reply_size`
    /// bytes back (zero means fire-and-forget).
    Forward { reply_size: usize },
    /// Read `size` more bytes from the device.
    Read { size: usize },
    /// The host must supply a parameter block of `size` bytes next.
    ExpectBlock { size: usize },
    /// Answer the host with one NAK; do not touch the transport.
    Nak,
    /// The exchange is complete; wait for the next command.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitCommand,
    /// Simple command forwarded; fixed-size reply in flight.
    WaitFixedReply,
    /// Identity-style command forwarded; block-info header in flight.
    WaitIdentInfo,
    /// Relaying the identity data.
    RelayIdent,
    /// Parameter command forwarded; device ACK in flight.
    WaitParamAck { block_size: usize },
    /// Device ACKed; the host owes us the parameter block.
    WaitParamBlock { block_size: usize },
    /// Parameter block forwarded; closing device ACK in flight.
    WaitParamDone,
    /// Image command forwarded; block-info header in flight.
    WaitBlockInfo,
    /// Relaying one image data block.
    RelayImage { end: bool },
    /// Data relayed; the host decides with ACK (continue) or NAK (abort).
    WaitImageAck,
    /// Extended image command forwarded; extended info in flight.
    WaitExtendedInfo,
    /// Relaying fixed-size extended blocks.
    RelayBlocks { blocks_left: u16, block_size: usize },
}

/// Handshake machine for one legacy device connection.
#[derive(Debug)]
pub struct LegacyMachine {
    state: State,
}

impl Default for LegacyMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyMachine {
    #[must_use]
    pub fn new() -> Self {
        LegacyMachine {
            state: State::WaitCommand,
        }
    }

    /// Whether the machine is between exchanges.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == State::WaitCommand
    }

    /// The host submitted bytes.
    pub fn on_command(&mut self, cmd: &[u8]) -> LegacyDirective {
        match self.state {
            State::WaitCommand => self.dispatch_command(cmd),
            State::WaitParamBlock { block_size } => {
                if cmd.len() != block_size {
                    warn!(
                        expected = block_size,
                        actual = cmd.len(),
                        "parameter block with wrong size"
                    );
                    self.state = State::WaitCommand;
                    return LegacyDirective::Nak;
                }
                self.state = State::WaitParamDone;
                LegacyDirective::Forward { reply_size: 1 }
            }
            State::WaitImageAck => match cmd {
                [ACK] => {
                    self.state = State::WaitBlockInfo;
                    LegacyDirective::Forward {
                        reply_size: BLOCK_INFO_SIZE,
                    }
                }
                _ => {
                    // anything else aborts the transfer; pass it on so
                    // the device stops sending
                    debug!("image transfer aborted by host");
                    self.state = State::WaitCommand;
                    LegacyDirective::Forward { reply_size: 0 }
                }
            },
            _ => {
                warn!(state = ?self.state, "host bytes while a reply was pending");
                self.state = State::WaitCommand;
                LegacyDirective::Nak
            }
        }
    }

    /// The device produced the bytes the last directive asked for.
    pub fn on_reply(&mut self, reply: &[u8]) -> LegacyDirective {
        match self.state {
            State::WaitFixedReply => {
                self.state = State::WaitCommand;
                LegacyDirective::Done
            }
            State::WaitIdentInfo => {
                let size = data_count(reply);
                if size == 0 {
                    self.state = State::WaitCommand;
                    return LegacyDirective::Done;
                }
                self.state = State::RelayIdent;
                LegacyDirective::Read { size }
            }
            State::RelayIdent => {
                self.state = State::WaitCommand;
                LegacyDirective::Done
            }
            State::WaitParamAck { block_size } => {
                if reply == [ACK] {
                    self.state = State::WaitParamBlock { block_size };
                    LegacyDirective::ExpectBlock { size: block_size }
                } else {
                    // device refused the command; the host sees the NAK
                    self.state = State::WaitCommand;
                    LegacyDirective::Done
                }
            }
            State::WaitParamDone => {
                self.state = State::WaitCommand;
                LegacyDirective::Done
            }
            State::WaitBlockInfo => {
                let end = reply.first().is_some_and(|s| s & IMAGE_END_BIT != 0);
                let size = data_count(reply);
                if size == 0 {
                    self.state = State::WaitCommand;
                    return LegacyDirective::Done;
                }
                self.state = State::RelayImage { end };
                LegacyDirective::Read { size }
            }
            State::RelayImage { end } => {
                if end {
                    self.state = State::WaitCommand;
                } else {
                    self.state = State::WaitImageAck;
                }
                LegacyDirective::Done
            }
            State::WaitExtendedInfo => {
                if reply.len() < EXTENDED_INFO_SIZE {
                    self.state = State::WaitCommand;
                    return LegacyDirective::Done;
                }
                let block_size = usize::from(u16::from_le_bytes([reply[2], reply[3]]));
                let blocks = u16::from_le_bytes([reply[4], reply[5]]);
                if blocks == 0 || block_size == 0 {
                    self.state = State::WaitCommand;
                    return LegacyDirective::Done;
                }
                self.state = State::RelayBlocks {
                    blocks_left: blocks,
                    block_size,
                };
                // each relay block carries one trailing handshake byte
                LegacyDirective::Read {
                    size: block_size + 1,
                }
            }
            State::RelayBlocks {
                blocks_left,
                block_size,
            } => {
                let end = reply.last().is_some_and(|b| b & BLOCK_END_BIT != 0);
                if end || blocks_left <= 1 {
                    self.state = State::WaitCommand;
                    return LegacyDirective::Done;
                }
                self.state = State::RelayBlocks {
                    blocks_left: blocks_left - 1,
                    block_size,
                };
                LegacyDirective::Read {
                    size: block_size + 1,
                }
            }
            State::WaitCommand
            | State::WaitParamBlock { .. }
            | State::WaitImageAck => {
                warn!(state = ?self.state, "unexpected device bytes");
                self.state = State::WaitCommand;
                LegacyDirective::Done
            }
        }
    }

    fn dispatch_command(&mut self, cmd: &[u8]) -> LegacyDirective {
        match cmd {
            // single-byte and control commands with a one-byte answer
            [ESC, b'@'] | [ESC, b'F'] | [FF] => {
                self.state = State::WaitFixedReply;
                LegacyDirective::Forward { reply_size: 1 }
            }
            // identity and extended status: the reply announces its own size
            [ESC, b'I'] | [ESC, b'f'] => {
                self.state = State::WaitIdentInfo;
                LegacyDirective::Forward {
                    reply_size: BLOCK_INFO_SIZE,
                }
            }
            // parameter-setting commands: ACK, block, ACK
            [ESC, b'C'] | [ESC, b'D'] | [ESC, b'L'] | [ESC, b'B'] | [ESC, b'Z'] => {
                self.state = State::WaitParamAck { block_size: 1 };
                LegacyDirective::Forward { reply_size: 1 }
            }
            [ESC, b'R'] => {
                self.state = State::WaitParamAck { block_size: 4 };
                LegacyDirective::Forward { reply_size: 1 }
            }
            [ESC, b'A'] => {
                self.state = State::WaitParamAck { block_size: 8 };
                LegacyDirective::Forward { reply_size: 1 }
            }
            // image transfer with per-block host handshake
            [ESC, b'G'] => {
                self.state = State::WaitBlockInfo;
                LegacyDirective::Forward {
                    reply_size: BLOCK_INFO_SIZE,
                }
            }
            // extended transfer: the device announces block size and count
            [ESC, b'g'] => {
                self.state = State::WaitExtendedInfo;
                LegacyDirective::Forward {
                    reply_size: EXTENDED_INFO_SIZE,
                }
            }
            _ => {
                debug!(len = cmd.len(), "unsupported legacy command");
                LegacyDirective::Nak
            }
        }
    }
}

/// 16-bit little-endian data count in a block-info header.
fn data_count(reply: &[u8]) -> usize {
    if reply.len() < BLOCK_INFO_SIZE {
        return 0;
    }
    usize::from(u16::from_le_bytes([reply[2], reply[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unsupported_command_naks_without_state_leakage() {
        let mut machine = LegacyMachine::new();

        assert_eq!(machine.on_command(&[ESC, b'Q']), LegacyDirective::Nak);
        assert!(machine.is_idle());

        // the next recognized command proceeds normally
        assert_eq!(
            machine.on_command(&[ESC, b'F']),
            LegacyDirective::Forward { reply_size: 1 }
        );
    }

    #[test]
    fn test_simple_status_command() {
        let mut machine = LegacyMachine::new();

        assert_eq!(
            machine.on_command(&[ESC, b'F']),
            LegacyDirective::Forward { reply_size: 1 }
        );
        assert_eq!(machine.on_reply(&[0x00]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_identity_reply_computes_its_own_size() {
        let mut machine = LegacyMachine::new();

        assert_eq!(
            machine.on_command(&[ESC, b'I']),
            LegacyDirective::Forward { reply_size: 4 }
        );
        // info header announcing 18 data bytes
        assert_eq!(
            machine.on_reply(&[0x00, 0x00, 18, 0]),
            LegacyDirective::Read { size: 18 }
        );
        assert_eq!(machine.on_reply(&[0u8; 18]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_parameter_command_full_cycle() {
        let mut machine = LegacyMachine::new();

        assert_eq!(
            machine.on_command(&[ESC, b'R']),
            LegacyDirective::Forward { reply_size: 1 }
        );
        assert_eq!(
            machine.on_reply(&[ACK]),
            LegacyDirective::ExpectBlock { size: 4 }
        );
        assert_eq!(
            machine.on_command(&[0x2C, 0x01, 0x2C, 0x01]),
            LegacyDirective::Forward { reply_size: 1 }
        );
        assert_eq!(machine.on_reply(&[ACK]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_parameter_command_device_nak() {
        let mut machine = LegacyMachine::new();

        machine.on_command(&[ESC, b'C']);
        // device refuses; the exchange ends and the host sees the NAK
        assert_eq!(machine.on_reply(&[NAK]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_wrong_size_parameter_block_naks() {
        let mut machine = LegacyMachine::new();

        machine.on_command(&[ESC, b'A']);
        machine.on_reply(&[ACK]);
        assert_eq!(machine.on_command(&[0x00, 0x01]), LegacyDirective::Nak);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_image_transfer_two_blocks() {
        let mut machine = LegacyMachine::new();

        assert_eq!(
            machine.on_command(&[ESC, b'G']),
            LegacyDirective::Forward { reply_size: 4 }
        );
        // first block: 256 bytes, not final
        assert_eq!(
            machine.on_reply(&[0x00, 0x00, 0x00, 0x01]),
            LegacyDirective::Read { size: 256 }
        );
        assert_eq!(machine.on_reply(&[0u8; 256]), LegacyDirective::Done);
        assert!(!machine.is_idle());

        // host acknowledges, second block carries the end bit
        assert_eq!(
            machine.on_command(&[ACK]),
            LegacyDirective::Forward { reply_size: 4 }
        );
        assert_eq!(
            machine.on_reply(&[IMAGE_END_BIT, 0x00, 0x80, 0x00]),
            LegacyDirective::Read { size: 128 }
        );
        assert_eq!(machine.on_reply(&[0u8; 128]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_image_transfer_host_abort() {
        let mut machine = LegacyMachine::new();

        machine.on_command(&[ESC, b'G']);
        machine.on_reply(&[0x00, 0x00, 0x10, 0x00]);
        machine.on_reply(&[0u8; 16]);

        // host sends NAK instead of ACK; it is forwarded fire-and-forget
        assert_eq!(
            machine.on_command(&[NAK]),
            LegacyDirective::Forward { reply_size: 0 }
        );
        assert!(machine.is_idle());
    }

    #[test]
    fn test_extended_transfer_counts_blocks() {
        let mut machine = LegacyMachine::new();

        assert_eq!(
            machine.on_command(&[ESC, b'g']),
            LegacyDirective::Forward { reply_size: 6 }
        );
        // 2 blocks of 512 bytes each (+1 trailing byte per block)
        assert_eq!(
            machine.on_reply(&[0x00, 0x00, 0x00, 0x02, 0x02, 0x00]),
            LegacyDirective::Read { size: 513 }
        );
        assert_eq!(
            machine.on_reply(&[0u8; 513]),
            LegacyDirective::Read { size: 513 }
        );
        assert_eq!(machine.on_reply(&[0u8; 513]), LegacyDirective::Done);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_extended_transfer_end_bit_stops_early() {
        let mut machine = LegacyMachine::new();

        machine.on_command(&[ESC, b'g']);
        // 5 blocks announced
        machine.on_reply(&[0x00, 0x00, 0x00, 0x02, 0x05, 0x00]);

        // second block's trailing byte carries the end bit
        let mut block = vec![0u8; 513];
        assert_eq!(
            machine.on_reply(&block),
            LegacyDirective::Read { size: 513 }
        );
        *block.last_mut().unwrap() = BLOCK_END_BIT;
        assert_eq!(machine.on_reply(&block), LegacyDirective::Done);
        assert!(machine.is_idle());
    }
}
