#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

//! SPI command-protocol driver for ESP32 AirLift/NINA WiFi co-processors.
//! The wire format, opcodes, and timing mirror the NINA firmware exactly;
//! hardware access goes through the seams in [`backend`] so the whole
//! driver runs against the scripted co-processor in [`sim`] on a host.

#[cfg(all(not(feature = "std"), feature = "alloc"))]
extern crate alloc;

pub mod backend;
pub mod driver;
#[cfg(feature = "eh1")]
pub mod eh;
pub mod network;
pub mod sim;
pub mod socket;

pub use backend::{BusConfig, Clock, ControlPins, SpiTransport};
pub use driver::SpiDriver;
pub use network::NetworkRecord;
pub use socket::Socket;

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::vec::Vec as StdVec;

#[cfg(all(not(feature = "std"), feature = "alloc"))]
pub(crate) type Vec<T> = StdVec<T>;
#[cfg(feature = "std")]
pub(crate) type Vec<T> = std::vec::Vec<T>;

// Frame markers. An ERR marker in place of START aborts the read.
pub const START_CMD: u8 = 0xE0;
pub const END_CMD: u8 = 0xEE;
pub const ERR_CMD: u8 = 0xEF;
pub const REPLY_FLAG: u8 = 0x80;

// Network configuration
pub const SET_NET_CMD: u8 = 0x10;
pub const SET_PASSPHRASE_CMD: u8 = 0x11;
pub const SET_IP_CONFIG_CMD: u8 = 0x14;
pub const SET_DNS_CONFIG_CMD: u8 = 0x15;
pub const SET_HOSTNAME_CMD: u8 = 0x16;
pub const SET_AP_NET_CMD: u8 = 0x18;
pub const SET_AP_PASSPHRASE_CMD: u8 = 0x19;
pub const SET_DEBUG_CMD: u8 = 0x1A;

// Status and association info
pub const GET_CONN_STATUS_CMD: u8 = 0x20;
pub const GET_IPADDR_CMD: u8 = 0x21;
pub const GET_MACADDR_CMD: u8 = 0x22;
pub const GET_CURR_SSID_CMD: u8 = 0x23;
pub const GET_CURR_BSSID_CMD: u8 = 0x24;
pub const GET_CURR_RSSI_CMD: u8 = 0x25;
pub const GET_CURR_ENCT_CMD: u8 = 0x26;

// Scanning and sockets
pub const SCAN_NETWORKS_CMD: u8 = 0x27;
pub const START_SERVER_TCP_CMD: u8 = 0x28;
pub const GET_STATE_TCP_CMD: u8 = 0x29;
pub const DATA_SENT_TCP_CMD: u8 = 0x2A;
pub const AVAIL_DATA_TCP_CMD: u8 = 0x2B;
pub const GET_DATA_TCP_CMD: u8 = 0x2C;
pub const START_CLIENT_TCP_CMD: u8 = 0x2D;
pub const STOP_CLIENT_TCP_CMD: u8 = 0x2E;
pub const GET_CLIENT_STATE_TCP_CMD: u8 = 0x2F;
pub const DISCONNECT_CMD: u8 = 0x30;
pub const GET_IDX_RSSI_CMD: u8 = 0x32;
pub const GET_IDX_ENCT_CMD: u8 = 0x33;
pub const REQ_HOST_BY_NAME_CMD: u8 = 0x34;
pub const GET_HOST_BY_NAME_CMD: u8 = 0x35;
pub const START_SCAN_NETWORKS_CMD: u8 = 0x36;
pub const GET_FW_VERSION_CMD: u8 = 0x37;
pub const SEND_UDP_DATA_CMD: u8 = 0x39;
pub const GET_REMOTE_DATA_CMD: u8 = 0x3A;
pub const GET_TIME_CMD: u8 = 0x3B;
pub const GET_IDX_BSSID_CMD: u8 = 0x3C;
pub const GET_IDX_CHAN_CMD: u8 = 0x3D;
pub const PING_CMD: u8 = 0x3E;
pub const GET_SOCKET_CMD: u8 = 0x3F;

// TLS credentials and bulk transfer
pub const SET_CLI_CERT_CMD: u8 = 0x40;
pub const SET_PK_CMD: u8 = 0x41;
pub const SEND_DATA_TCP_CMD: u8 = 0x44;
pub const GET_DATABUF_TCP_CMD: u8 = 0x45;
pub const INSERT_DATABUF_TCP_CMD: u8 = 0x46;

// WPA2 Enterprise
pub const SET_ENT_IDENT_CMD: u8 = 0x4A;
pub const SET_ENT_UNAME_CMD: u8 = 0x4B;
pub const SET_ENT_PASSWD_CMD: u8 = 0x4C;
pub const SET_ENT_ENABLE_CMD: u8 = 0x4F;

// GPIO passthrough
pub const SET_PIN_MODE_CMD: u8 = 0x50;
pub const SET_DIGITAL_WRITE_CMD: u8 = 0x51;
pub const SET_ANALOG_WRITE_CMD: u8 = 0x52;
pub const SET_DIGITAL_READ_CMD: u8 = 0x53;
pub const SET_ANALOG_READ_CMD: u8 = 0x54;

/// Socket handle value the co-processor returns when none are free.
pub const NO_SOCKET_AVAIL: u8 = 255;
/// Socket payloads move across the bus in chunks of this size.
pub const SOCKET_CHUNK_SIZE: usize = 64;
/// Initial capacity of the reusable request buffer. It grows, never shrinks.
pub const DEFAULT_SENDBUF_SIZE: usize = 256;

// Handshake and polling deadlines, in milliseconds.
pub const READY_LOW_TIMEOUT_MS: u64 = 10_000;
pub const READY_HIGH_TIMEOUT_MS: u64 = 1_000;
pub const RESYNC_ATTEMPTS: u32 = 10;
pub const RESYNC_SPACING_MS: u32 = 10;
/// AP association is slow; status is polled at this interval.
pub const STATUS_POLL_MS: u32 = 50;
/// Socket establishment polls faster than AP association.
pub const SOCKET_POLL_MS: u32 = 10;
pub const SOCKET_CONNECT_TIMEOUT_MS: u64 = 3_000;
pub const RESET_HOLD_MS: u32 = 10;
pub const BOOT_DELAY_MS: u32 = 750;

/// WiFi association status as reported by the co-processor. The driver never
/// computes transitions locally; the reported byte is authoritative.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WifiStatus {
    Idle,
    NoSsidAvail,
    ScanCompleted,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
    ApListening,
    ApConnected,
    ApFailed,
    Stopped,
    NoShield,
    Unknown(u8),
}

impl From<u8> for WifiStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => WifiStatus::Idle,
            1 => WifiStatus::NoSsidAvail,
            2 => WifiStatus::ScanCompleted,
            3 => WifiStatus::Connected,
            4 => WifiStatus::ConnectFailed,
            5 => WifiStatus::ConnectionLost,
            6 => WifiStatus::Disconnected,
            7 => WifiStatus::ApListening,
            8 => WifiStatus::ApConnected,
            9 => WifiStatus::ApFailed,
            254 => WifiStatus::Stopped,
            255 => WifiStatus::NoShield,
            other => WifiStatus::Unknown(other),
        }
    }
}

impl From<WifiStatus> for u8 {
    fn from(status: WifiStatus) -> Self {
        match status {
            WifiStatus::Idle => 0,
            WifiStatus::NoSsidAvail => 1,
            WifiStatus::ScanCompleted => 2,
            WifiStatus::Connected => 3,
            WifiStatus::ConnectFailed => 4,
            WifiStatus::ConnectionLost => 5,
            WifiStatus::Disconnected => 6,
            WifiStatus::ApListening => 7,
            WifiStatus::ApConnected => 8,
            WifiStatus::ApFailed => 9,
            WifiStatus::Stopped => 254,
            WifiStatus::NoShield => 255,
            WifiStatus::Unknown(raw) => raw,
        }
    }
}

/// Per-socket TCP state, reported by the co-processor, never locally derived.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
    Unknown(u8),
}

impl From<u8> for TcpState {
    fn from(value: u8) -> Self {
        match value {
            0 => TcpState::Closed,
            1 => TcpState::Listen,
            2 => TcpState::SynSent,
            3 => TcpState::SynRcvd,
            4 => TcpState::Established,
            5 => TcpState::FinWait1,
            6 => TcpState::FinWait2,
            7 => TcpState::CloseWait,
            8 => TcpState::Closing,
            9 => TcpState::LastAck,
            10 => TcpState::TimeWait,
            other => TcpState::Unknown(other),
        }
    }
}

/// Socket transport mode. The discriminant goes on the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectMode {
    Tcp = 0,
    Udp = 1,
    Tls = 2,
}

/// Everything a driver call can fail with. `E` is the transport's own error
/// type; the other variants cover the protocol-level failure taxonomy.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// The transport itself failed (SPI bus error).
    Bus(E),
    /// The ready line never reached the level we were waiting for.
    /// The payload is the level that was expected.
    ReadyTimeout(bool),
    /// The resync scan never found a START marker.
    ResponseTimeout,
    /// The co-processor answered with the explicit ERR marker.
    ErrorResponse,
    /// A marker or echoed-opcode byte did not match.
    UnexpectedByte { expected: u8, got: u8 },
    /// A reply arrived with no parameters where one was required.
    EmptyResponse,
    /// The co-processor has no free socket handles (255 sentinel).
    NoSocketAvailable,
    /// The firmware supports a single TLS socket and it is taken.
    TlsSlotBusy,
    /// A success/fail command returned something other than 1.
    /// The payload names the failing operation.
    CommandFailed(&'static str),
    /// Socket write acknowledged fewer units than were sent.
    PartialWrite { acked: usize, expected: usize },
    /// AP association did not reach Connected before the deadline.
    ConnectTimeout,
    /// Socket did not reach Established before the deadline.
    SocketConnectTimeout,
    /// Receive deadline expired with no data read at all.
    RecvTimeout,
    /// A socket call was made before a successful connect.
    NotConnected,
    /// The co-processor reported wall-clock time 0 (NTP not yet synced).
    TimeNotSet,
    /// Analog read came back negative (invalid pin on the co-processor).
    InvalidAnalogRead,
}

/// Frame overhead: START + command + parameter count + END.
const FRAME_OVERHEAD: usize = 4;

/// Length of an encoded request before padding.
pub fn raw_frame_len(params: &[&[u8]]) -> usize {
    FRAME_OVERHEAD + params.iter().map(|p| 1 + p.len()).sum::<usize>()
}

/// Length of an encoded request after zero-padding to a 4-byte boundary.
pub fn padded_frame_len(params: &[&[u8]]) -> usize {
    raw_frame_len(params).next_multiple_of(4)
}

/// Encode a request frame into `out`, reusing its allocation. The buffer is
/// cleared and refilled; capacity only ever grows.
///
/// Layout: START, opcode with the reply flag cleared, parameter count, then
/// each parameter as a single length byte plus raw bytes, END, zero padding
/// to a multiple of 4.
pub fn encode_command(out: &mut Vec<u8>, cmd: u8, params: &[&[u8]]) {
    let total = padded_frame_len(params);
    out.clear();
    out.reserve(total);

    out.push(START_CMD);
    out.push(cmd & !REPLY_FLAG);
    out.push(params.len() as u8);
    for p in params {
        out.push(p.len() as u8);
        out.extend_from_slice(p);
    }
    out.push(END_CMD);
    while out.len() < total {
        out.push(0);
    }
}

/// Encode a reply frame the way the co-processor does: START, opcode with the
/// reply flag set, parameter count, 1-byte-length parameters, END. Used by the
/// simulator to script byte-exact responses.
pub fn encode_response(cmd: u8, params: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_frame_len(params));
    out.push(START_CMD);
    out.push(cmd | REPLY_FLAG);
    out.push(params.len() as u8);
    for p in params {
        out.push(p.len() as u8);
        out.extend_from_slice(p);
    }
    out.push(END_CMD);
    out
}

/// Encode a bulk reply frame: single parameter with a 16-bit big-endian
/// length, as `GET_DATABUF_TCP_CMD` replies use.
pub fn encode_bulk_response(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + payload.len());
    out.push(START_CMD);
    out.push(cmd | REPLY_FLAG);
    out.push(1);
    out.push((payload.len() >> 8) as u8);
    out.push((payload.len() & 0xFF) as u8);
    out.extend_from_slice(payload);
    out.push(END_CMD);
    out
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn encoded_request_is_padded_to_four() {
        let cases: &[&[&[u8]]] = &[
            &[],
            &[b"a"],
            &[b"ab", b"c"],
            &[b"myssid", b"mypassword"],
            &[&[0u8; 63], &[1u8; 64], &[2u8; 65]],
        ];
        for params in cases {
            let mut buf = Vec::new();
            encode_command(&mut buf, GET_CONN_STATUS_CMD, params);
            assert_eq!(buf.len() % 4, 0);
            assert!(buf.len() >= raw_frame_len(params));
            assert_eq!(buf.len(), padded_frame_len(params));
        }
    }

    #[test]
    fn encoded_request_layout() {
        let mut buf = Vec::new();
        encode_command(&mut buf, SET_PASSPHRASE_CMD | REPLY_FLAG, &[b"net", b"pw"]);

        // Reply flag is always cleared on requests.
        assert_eq!(buf[0], START_CMD);
        assert_eq!(buf[1], SET_PASSPHRASE_CMD);
        assert_eq!(buf[2], 2);
        assert_eq!(buf[3], 3);
        assert_eq!(&buf[4..7], b"net");
        assert_eq!(buf[7], 2);
        assert_eq!(&buf[8..10], b"pw");
        assert_eq!(buf[10], END_CMD);
        // 11 raw bytes pad to 12.
        assert_eq!(buf.len(), 12);
        assert_eq!(buf[11], 0);
    }

    #[test]
    fn send_buffer_capacity_never_shrinks() {
        let mut buf = Vec::new();
        encode_command(&mut buf, PING_CMD, &[&[10, 0, 0, 1], &[250]]);
        let cap = buf.capacity();
        encode_command(&mut buf, GET_SOCKET_CMD, &[]);
        assert!(buf.capacity() >= cap);
    }

    #[test]
    fn bulk_response_length_is_big_endian() {
        let payload = [0xAB; 300];
        let frame = encode_bulk_response(GET_DATABUF_TCP_CMD, &payload);
        assert_eq!(frame[1], GET_DATABUF_TCP_CMD | REPLY_FLAG);
        assert_eq!(frame[3], 0x01);
        assert_eq!(frame[4], 0x2C);
        assert_eq!(*frame.last().unwrap(), END_CMD);
    }

    #[test]
    fn wifi_status_round_trips_including_unknown() {
        for raw in [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9, 254, 255, 42] {
            let status = WifiStatus::from(raw);
            assert_eq!(u8::from(status), raw);
        }
        assert_eq!(WifiStatus::from(3), WifiStatus::Connected);
        assert_eq!(WifiStatus::from(42), WifiStatus::Unknown(42));
    }

    #[test]
    fn tcp_state_maps_reported_bytes() {
        assert_eq!(TcpState::from(0), TcpState::Closed);
        assert_eq!(TcpState::from(4), TcpState::Established);
        assert_eq!(TcpState::from(10), TcpState::TimeWait);
        assert_eq!(TcpState::from(11), TcpState::Unknown(11));
    }
}
