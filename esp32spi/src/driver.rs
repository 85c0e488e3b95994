//! The co-processor handle: ready-line handshake, synchronous
//! command/response engine, and the operation façade built on top.
//!
//! Every operation is one or two full bus transactions. A transaction is
//! bracketed by `begin_transaction`/`end_transaction`; the single
//! consolidated `end_transaction` call on every exit path (error paths
//! included) is what keeps the shared bus from wedging.

use crate::backend::{BusConfig, Clock, ControlPins, SpiTransport};
use crate::{
    encode_command, ConnectMode, Error, TcpState, Vec, WifiStatus, AVAIL_DATA_TCP_CMD,
    BOOT_DELAY_MS, DATA_SENT_TCP_CMD, DEFAULT_SENDBUF_SIZE, DISCONNECT_CMD, END_CMD, ERR_CMD,
    GET_CLIENT_STATE_TCP_CMD, GET_CONN_STATUS_CMD, GET_CURR_BSSID_CMD, GET_CURR_ENCT_CMD,
    GET_CURR_RSSI_CMD, GET_CURR_SSID_CMD, GET_DATABUF_TCP_CMD, GET_FW_VERSION_CMD,
    GET_HOST_BY_NAME_CMD, GET_IDX_BSSID_CMD, GET_IDX_CHAN_CMD, GET_IDX_ENCT_CMD,
    GET_IDX_RSSI_CMD, GET_IPADDR_CMD, GET_MACADDR_CMD, GET_REMOTE_DATA_CMD, GET_SOCKET_CMD,
    GET_STATE_TCP_CMD, GET_TIME_CMD, INSERT_DATABUF_TCP_CMD, NO_SOCKET_AVAIL, PING_CMD,
    READY_HIGH_TIMEOUT_MS, READY_LOW_TIMEOUT_MS, REPLY_FLAG, REQ_HOST_BY_NAME_CMD,
    RESET_HOLD_MS, RESYNC_ATTEMPTS, RESYNC_SPACING_MS, SCAN_NETWORKS_CMD, SEND_DATA_TCP_CMD,
    SEND_UDP_DATA_CMD, SET_ANALOG_READ_CMD, SET_ANALOG_WRITE_CMD, SET_CLI_CERT_CMD,
    SET_DEBUG_CMD, SET_DIGITAL_READ_CMD, SET_DIGITAL_WRITE_CMD, SET_DNS_CONFIG_CMD,
    SET_ENT_ENABLE_CMD, SET_ENT_IDENT_CMD, SET_ENT_PASSWD_CMD, SET_ENT_UNAME_CMD,
    SET_HOSTNAME_CMD, SET_IP_CONFIG_CMD, SET_NET_CMD, SET_PASSPHRASE_CMD, SET_PIN_MODE_CMD,
    SET_PK_CMD, SOCKET_CHUNK_SIZE, START_CLIENT_TCP_CMD, START_CMD, START_SCAN_NETWORKS_CMD,
    START_SERVER_TCP_CMD, STATUS_POLL_MS, STOP_CLIENT_TCP_CMD,
};
use crate::network::NetworkRecord;

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::vec;

/// Driver handle for one physical radio. Owns its transport, control lines,
/// and clock; [`SpiDriver::release`] hands them back when the radio is no
/// longer needed.
pub struct SpiDriver<S, P, C> {
    spi: S,
    pins: P,
    clock: C,
    sendbuf: Vec<u8>,
    lock_held: bool,
    tls_socket: Option<u8>,
}

impl<S, P, C> SpiDriver<S, P, C>
where
    S: SpiTransport,
    P: ControlPins,
    C: Clock,
{
    /// Take ownership of the bus, control lines, and clock, then hard-reset
    /// the co-processor and wait for its firmware to boot.
    pub fn new(spi: S, pins: P, clock: C) -> Self {
        let mut driver = Self {
            spi,
            pins,
            clock,
            sendbuf: Vec::with_capacity(DEFAULT_SENDBUF_SIZE),
            lock_held: false,
            tls_socket: None,
        };
        driver.pins.set_chip_select(true);
        driver.reset();
        driver
    }

    /// Hard-reset the co-processor without destroying the handle. When a
    /// boot-mode pin is wired it is driven high for the duration so the chip
    /// boots into the NINA firmware rather than the serial bootloader.
    pub fn reset(&mut self) {
        if self.pins.has_gpio0() {
            self.pins.gpio0_drive(true);
        }

        self.pins.set_chip_select(true);
        self.pins.set_reset(false);
        self.clock.delay_ms(RESET_HOLD_MS);
        self.pins.set_reset(true);
        self.clock.delay_ms(BOOT_DELAY_MS);

        if self.pins.has_gpio0() {
            self.pins.gpio0_release();
        }

        self.tls_socket = None;
    }

    /// Give the transport, pins, and clock back to the caller. The
    /// co-processor keeps whatever state it had; nothing is shut down.
    pub fn release(self) -> (S, P, C) {
        (self.spi, self.pins, self.clock)
    }

    /// Socket number currently holding the single TLS slot, if any.
    pub fn tls_socket(&self) -> Option<u8> {
        self.tls_socket
    }

    // ------------------------------------------------------------------
    // Transport handshake
    // ------------------------------------------------------------------

    /// Poll the ready line until it reads `level`. On expiry the transaction
    /// is torn down before the error surfaces, so no lock outlives a failure.
    fn wait_for_ready(&mut self, level: bool, timeout_ms: u64) -> Result<(), Error<S::Error>> {
        let start = self.clock.now_ms();
        while self.clock.now_ms().wrapping_sub(start) < timeout_ms {
            if self.pins.ready() == level {
                return Ok(());
            }
            self.clock.yield_background();
        }

        self.end_transaction();
        Err(Error::ReadyTimeout(level))
    }

    /// Wait for the co-processor, take the bus lock, configure, select.
    ///
    /// The ready line is the hardware semaphore: the firmware pulls it low
    /// when willing to start a transaction and raises it once it has seen
    /// chip-select fall.
    fn begin_transaction(&mut self) -> Result<(), Error<S::Error>> {
        self.wait_for_ready(false, READY_LOW_TIMEOUT_MS)?;

        while !self.spi.try_lock() {
            self.clock.yield_background();
        }
        self.lock_held = true;

        if let Err(e) = self.spi.configure(BusConfig::nina_default()) {
            self.end_transaction();
            return Err(Error::Bus(e));
        }

        self.pins.set_chip_select(false);
        self.wait_for_ready(true, READY_HIGH_TIMEOUT_MS)
    }

    /// Deselect and release the lock if held. Idempotent; this is the only
    /// place the lock is ever released.
    fn end_transaction(&mut self) {
        if self.lock_held {
            self.pins.set_chip_select(true);
            self.spi.unlock();
            self.lock_held = false;
        }
    }

    // ------------------------------------------------------------------
    // Command/response engine
    // ------------------------------------------------------------------

    /// Encode and clock out one request frame in its own transaction.
    fn send_command(&mut self, cmd: u8, params: &[&[u8]]) -> Result<(), Error<S::Error>> {
        encode_command(&mut self.sendbuf, cmd, params);

        self.begin_transaction()?;
        let result = self.write_request();
        self.end_transaction();
        result
    }

    fn write_request(&mut self) -> Result<(), Error<S::Error>> {
        self.wait_for_ready(true, READY_HIGH_TIMEOUT_MS)?;
        self.spi.write(&self.sendbuf).map_err(Error::Bus)
    }

    /// Read one reply frame in its own transaction and decode it into the
    /// per-parameter buffers the co-processor reported.
    fn wait_response(&mut self, cmd: u8) -> Result<Vec<Vec<u8>>, Error<S::Error>> {
        self.begin_transaction()?;
        let result = self.read_response(cmd);
        self.end_transaction();
        result
    }

    fn read_response(&mut self, cmd: u8) -> Result<Vec<Vec<u8>>, Error<S::Error>> {
        self.wait_spi_char(START_CMD)?;
        self.check_byte(cmd | REPLY_FLAG)?;

        let count = self.read_byte()? as usize;
        let mut responses = Vec::with_capacity(count);
        for _ in 0..count {
            let len = self.read_byte()? as usize;
            let mut param = vec![0u8; len];
            self.spi.read(&mut param, 0xFF).map_err(Error::Bus)?;
            responses.push(param);
        }

        self.check_byte(END_CMD)?;
        Ok(responses)
    }

    fn read_byte(&mut self) -> Result<u8, Error<S::Error>> {
        let mut byte = [0u8; 1];
        self.spi.read(&mut byte, 0xFF).map_err(Error::Bus)?;
        Ok(byte[0])
    }

    /// Bounded resync scan: discard bytes until `desired` shows up. An ERR
    /// marker aborts immediately; running out of attempts is a timeout.
    fn wait_spi_char(&mut self, desired: u8) -> Result<(), Error<S::Error>> {
        for _ in 0..RESYNC_ATTEMPTS {
            let got = self.read_byte()?;
            if got == ERR_CMD {
                return Err(Error::ErrorResponse);
            }
            if got == desired {
                return Ok(());
            }
            self.clock.delay_ms(RESYNC_SPACING_MS);
        }
        Err(Error::ResponseTimeout)
    }

    fn check_byte(&mut self, desired: u8) -> Result<(), Error<S::Error>> {
        let got = self.read_byte()?;
        if got != desired {
            return Err(Error::UnexpectedByte {
                expected: desired,
                got,
            });
        }
        Ok(())
    }

    /// One full protocol exchange: send transaction, then receive
    /// transaction. The bus lock is released on every path out of here.
    pub fn send_command_get_response(
        &mut self,
        cmd: u8,
        params: &[&[u8]],
    ) -> Result<Vec<Vec<u8>>, Error<S::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("cmd {=u8:#x}: {=usize} params", cmd, params.len());

        self.send_command(cmd, params)?;
        self.wait_response(cmd)
    }

    /// Issue a command whose reply is a single success/fail byte.
    /// `op` names the operation in the resulting error.
    fn check_success(
        &mut self,
        cmd: u8,
        params: &[&[u8]],
        op: &'static str,
    ) -> Result<(), Error<S::Error>> {
        let responses = self.send_command_get_response(cmd, params)?;
        if let Some(&result) = responses.first().and_then(|p| p.first()) {
            if result != 1 {
                return Err(Error::CommandFailed(op));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status and association
    // ------------------------------------------------------------------

    /// Query the authoritative association status byte.
    pub fn get_status(&mut self) -> Result<WifiStatus, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CONN_STATUS_CMD, &[])?;
        match responses.first().and_then(|p| p.first()) {
            Some(&status) => Ok(WifiStatus::from(status)),
            None => Ok(WifiStatus::NoShield),
        }
    }

    /// Derived, never cached: true iff the status byte reads Connected.
    pub fn connected(&mut self) -> Result<bool, Error<S::Error>> {
        Ok(self.get_status()? == WifiStatus::Connected)
    }

    /// NINA firmware version string. Every NUL in the reply is scrubbed to
    /// a space, terminator included, so `"1.7.7\0"` reads back `"1.7.7 "`.
    pub fn firmware_version(&mut self) -> Result<Vec<u8>, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_FW_VERSION_CMD, &[])?;
        let mut version = responses.into_iter().next().unwrap_or_default();
        for b in version.iter_mut() {
            if *b == 0 {
                *b = b' ';
            }
        }
        Ok(version)
    }

    /// Station MAC address. The firmware reports it byte-reversed.
    pub fn mac_address(&mut self) -> Result<[u8; 6], Error<S::Error>> {
        let responses = self.send_command_get_response(GET_MACADDR_CMD, &[&[0xFF]])?;
        let mut mac = [0u8; 6];
        if let Some(raw) = responses.first().filter(|p| p.len() >= 6) {
            for (i, byte) in mac.iter_mut().enumerate() {
                *byte = raw[5 - i];
            }
        }
        Ok(mac)
    }

    /// Associate with an access point and wait for the link to come up.
    /// Polls status every 50 ms until Connected or `timeout_ms` elapses.
    pub fn connect_ap(
        &mut self,
        ssid: &[u8],
        password: &[u8],
        timeout_ms: u64,
    ) -> Result<(), Error<S::Error>> {
        self.check_success(SET_PASSPHRASE_CMD, &[ssid, password], "set passphrase")?;

        let start = self.clock.now_ms();
        while self.clock.now_ms().wrapping_sub(start) < timeout_ms {
            if self.get_status()? == WifiStatus::Connected {
                return Ok(());
            }
            self.clock.delay_ms(STATUS_POLL_MS);
            self.clock.yield_background();
        }
        Err(Error::ConnectTimeout)
    }

    pub fn disconnect(&mut self) -> Result<(), Error<S::Error>> {
        self.check_success(DISCONNECT_CMD, &[], "disconnect")
    }

    /// Current IPv4 address, all-zero when unassociated.
    pub fn ip_address(&mut self) -> Result<[u8; 4], Error<S::Error>> {
        let responses = self.send_command_get_response(GET_IPADDR_CMD, &[&[0xFF]])?;
        Ok(take_ip4(&responses))
    }

    /// Resolve a hostname via the co-processor's DNS client.
    pub fn host_by_name(&mut self, hostname: &[u8]) -> Result<[u8; 4], Error<S::Error>> {
        self.check_success(REQ_HOST_BY_NAME_CMD, &[hostname], "hostname lookup")?;
        let responses = self.send_command_get_response(GET_HOST_BY_NAME_CMD, &[])?;
        Ok(take_ip4(&responses))
    }

    /// ICMP ping; returns the round-trip time in milliseconds.
    pub fn ping(&mut self, dest: [u8; 4], ttl: u8) -> Result<u16, Error<S::Error>> {
        let responses = self.send_command_get_response(PING_CMD, &[&dest, &[ttl]])?;
        Ok(responses
            .first()
            .filter(|p| p.len() >= 2)
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .unwrap_or(0))
    }

    /// Epoch seconds from the co-processor's NTP-synced clock. A reported
    /// zero means time has not been set yet and is an error.
    pub fn get_time(&mut self) -> Result<u32, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_TIME_CMD, &[])?;
        match responses.first().filter(|p| p.len() >= 4) {
            Some(p) => {
                let timestamp = u32::from_le_bytes([p[0], p[1], p[2], p[3]]);
                if timestamp == 0 {
                    return Err(Error::TimeNotSet);
                }
                Ok(timestamp)
            }
            None => Ok(0),
        }
    }

    /// Toggle the NINA firmware's own debug logging (its UART, not ours).
    pub fn set_esp_debug(&mut self, enabled: bool) -> Result<(), Error<S::Error>> {
        self.check_success(SET_DEBUG_CMD, &[&[enabled as u8]], "set debug")
    }

    // ------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------

    /// Ask the co-processor for a free socket handle.
    pub fn get_socket(&mut self) -> Result<u8, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_SOCKET_CMD, &[])?;
        match responses.first().and_then(|p| p.first()) {
            Some(&socket) if socket != NO_SOCKET_AVAIL => Ok(socket),
            _ => Err(Error::NoSocketAvailable),
        }
    }

    /// Open a client connection. `dest` is either a raw 4-byte IPv4 address
    /// or a hostname; a destination containing no zero byte is treated as a
    /// hostname. (That discriminant misclassifies a raw address with a zero
    /// octet; it is the firmware-era behavior and is preserved, see the
    /// socket tests.) A TLS connect fails before any frame is sent if the
    /// single TLS slot is taken.
    pub fn socket_connect(
        &mut self,
        socket: u8,
        dest: &[u8],
        port: u16,
        mode: ConnectMode,
    ) -> Result<(), Error<S::Error>> {
        if mode == ConnectMode::Tls && self.tls_socket.is_some() {
            return Err(Error::TlsSlotBusy);
        }

        let port_bytes = port.to_be_bytes();
        let sock = [socket];
        let mode_byte = [mode as u8];

        let is_hostname = !dest.is_empty() && !dest.contains(&0);
        if is_hostname {
            // Five-parameter variant: hostname plus a placeholder address.
            let dummy_ip = [0u8; 4];
            self.check_success(
                START_CLIENT_TCP_CMD,
                &[dest, &dummy_ip, &port_bytes, &sock, &mode_byte],
                "socket connect",
            )?;
        } else {
            self.check_success(
                START_CLIENT_TCP_CMD,
                &[dest, &port_bytes, &sock, &mode_byte],
                "socket connect",
            )?;
        }

        if mode == ConnectMode::Tls {
            self.tls_socket = Some(socket);
        }
        Ok(())
    }

    /// Client-side TCP state for a socket, as reported by the co-processor.
    pub fn socket_status(&mut self, socket: u8) -> Result<TcpState, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CLIENT_STATE_TCP_CMD, &[&[socket]])?;
        Ok(responses
            .first()
            .and_then(|p| p.first())
            .map(|&state| TcpState::from(state))
            .unwrap_or(TcpState::Closed))
    }

    /// Write a payload in 64-byte chunks, then run the mode-specific
    /// completion check. UDP buffers chunks and needs a finalize command
    /// verified against the chunk count; TCP/TLS verify the acknowledged
    /// byte total and then the data-sent flag.
    pub fn socket_write(
        &mut self,
        socket: u8,
        buf: &[u8],
        mode: ConnectMode,
    ) -> Result<(), Error<S::Error>> {
        let sock = [socket];
        let send_cmd = if mode == ConnectMode::Udp {
            INSERT_DATABUF_TCP_CMD
        } else {
            SEND_DATA_TCP_CMD
        };

        let total_chunks = buf.len().div_ceil(SOCKET_CHUNK_SIZE);
        let mut acked: usize = 0;
        for chunk in buf.chunks(SOCKET_CHUNK_SIZE) {
            let responses = self.send_command_get_response(send_cmd, &[&sock, chunk])?;
            if let Some(&n) = responses.first().and_then(|p| p.first()) {
                acked += n as usize;
            }
        }

        if mode == ConnectMode::Udp {
            if acked != total_chunks {
                return Err(Error::PartialWrite {
                    acked,
                    expected: total_chunks,
                });
            }
            self.check_success(SEND_UDP_DATA_CMD, &[&sock], "send UDP data")
        } else {
            if acked != buf.len() {
                return Err(Error::PartialWrite {
                    acked,
                    expected: buf.len(),
                });
            }
            self.check_success(DATA_SENT_TCP_CMD, &[&sock], "verify data sent")
        }
    }

    /// Bytes waiting in the co-processor's receive buffer for a socket.
    pub fn socket_available(&mut self, socket: u8) -> Result<u16, Error<S::Error>> {
        let responses = self.send_command_get_response(AVAIL_DATA_TCP_CMD, &[&[socket]])?;
        Ok(responses
            .first()
            .filter(|p| p.len() >= 2)
            .map(|p| u16::from_le_bytes([p[0], p[1]]))
            .unwrap_or(0))
    }

    /// Read buffered socket data into `buf`. This is the bulk-transfer path:
    /// the reply carries a 16-bit length which may exceed `buf`; the excess
    /// is drained off the bus (never copied) so the frame stays aligned and
    /// the END marker can still be checked.
    pub fn socket_read(&mut self, socket: u8, buf: &mut [u8]) -> Result<usize, Error<S::Error>> {
        let size_bytes = (buf.len() as u16).to_le_bytes();
        self.send_command(GET_DATABUF_TCP_CMD, &[&[socket], &size_bytes])?;

        self.begin_transaction()?;
        let result = self.read_bulk_response(buf);
        self.end_transaction();
        result
    }

    fn read_bulk_response(&mut self, buf: &mut [u8]) -> Result<usize, Error<S::Error>> {
        self.wait_spi_char(START_CMD)?;
        self.check_byte(GET_DATABUF_TCP_CMD | REPLY_FLAG)?;

        let count = self.read_byte()?;
        let mut copied = 0usize;
        if count > 0 {
            // Bulk replies carry a 16-bit big-endian length, unlike the
            // 1-byte lengths everywhere else.
            let high = self.read_byte()? as usize;
            let low = self.read_byte()? as usize;
            let param_len = (high << 8) | low;

            copied = param_len.min(buf.len());
            self.spi.read(&mut buf[..copied], 0xFF).map_err(Error::Bus)?;

            for _ in copied..param_len {
                self.read_byte()?;
            }
        }

        self.check_byte(END_CMD)?;
        Ok(copied)
    }

    /// Close a socket. Best-effort: protocol errors from the close command
    /// are swallowed, the TLS slot is always cleared when it matches.
    pub fn socket_close(&mut self, socket: u8) {
        let _ = self.send_command_get_response(STOP_CLIENT_TCP_CMD, &[&[socket]]);
        if self.tls_socket == Some(socket) {
            self.tls_socket = None;
        }
    }

    /// Remote peer address and port for a connected socket.
    pub fn get_remote_data(&mut self, socket: u8) -> Result<([u8; 4], u16), Error<S::Error>> {
        let responses = self.send_command_get_response(GET_REMOTE_DATA_CMD, &[&[socket]])?;
        let mut ip = [0u8; 4];
        let mut port = 0u16;
        if responses.len() >= 2 {
            if responses[0].len() >= 4 {
                ip.copy_from_slice(&responses[0][..4]);
            }
            if responses[1].len() >= 2 {
                port = u16::from_le_bytes([responses[1][0], responses[1][1]]);
            }
        }
        Ok((ip, port))
    }

    // ------------------------------------------------------------------
    // Server sockets
    // ------------------------------------------------------------------

    pub fn start_server(
        &mut self,
        port: u16,
        socket: u8,
        mode: ConnectMode,
    ) -> Result<(), Error<S::Error>> {
        let port_bytes = port.to_be_bytes();
        self.check_success(
            START_SERVER_TCP_CMD,
            &[&port_bytes, &[socket], &[mode as u8]],
            "start server",
        )
    }

    pub fn server_state(&mut self, socket: u8) -> Result<u8, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_STATE_TCP_CMD, &[&[socket]])?;
        Ok(responses.first().and_then(|p| p.first()).copied().unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    /// Kick off an asynchronous AP scan on the co-processor.
    pub fn start_scan_networks(&mut self) -> Result<(), Error<S::Error>> {
        self.check_success(START_SCAN_NETWORKS_CMD, &[], "start AP scan")
    }

    /// Harvest scan results: one SSID per reply parameter, then per-index
    /// RSSI/authmode/BSSID/channel queries, all snapshotted into cached
    /// records. Returns an empty list while the scan is still running;
    /// callers kick with [`SpiDriver::start_scan_networks`] and poll.
    pub fn scan_networks(&mut self) -> Result<Vec<NetworkRecord>, Error<S::Error>> {
        let ssids = self.send_command_get_response(SCAN_NETWORKS_CMD, &[])?;

        let mut records = Vec::with_capacity(ssids.len());
        for (index, ssid) in ssids.into_iter().enumerate() {
            let idx = [index as u8];

            let rssi = self
                .send_command_get_response(GET_IDX_RSSI_CMD, &[&idx])?
                .first()
                .filter(|p| p.len() >= 4)
                .map(|p| i32::from_le_bytes([p[0], p[1], p[2], p[3]]));
            let authmode = self
                .send_command_get_response(GET_IDX_ENCT_CMD, &[&idx])?
                .first()
                .and_then(|p| p.first())
                .copied();
            let bssid = self
                .send_command_get_response(GET_IDX_BSSID_CMD, &[&idx])?
                .first()
                .filter(|p| p.len() >= 6)
                .map(|p| [p[0], p[1], p[2], p[3], p[4], p[5]]);
            let channel = self
                .send_command_get_response(GET_IDX_CHAN_CMD, &[&idx])?
                .first()
                .and_then(|p| p.first())
                .copied();

            records.push(NetworkRecord::from_scan(ssid, bssid, rssi, channel, authmode));
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Current-association queries (live side of NetworkRecord)
    // ------------------------------------------------------------------

    /// SSID of the current association, truncated to the 32-byte maximum.
    pub fn current_ssid(&mut self) -> Result<Vec<u8>, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CURR_SSID_CMD, &[&[0xFF]])?;
        let mut ssid = responses.into_iter().next().unwrap_or_default();
        ssid.truncate(32);
        Ok(ssid)
    }

    pub fn current_bssid(&mut self) -> Result<[u8; 6], Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CURR_BSSID_CMD, &[&[0xFF]])?;
        let mut bssid = [0u8; 6];
        if let Some(raw) = responses.first().filter(|p| p.len() >= 6) {
            bssid.copy_from_slice(&raw[..6]);
        }
        Ok(bssid)
    }

    pub fn current_rssi(&mut self) -> Result<i32, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CURR_RSSI_CMD, &[&[0xFF]])?;
        Ok(responses
            .first()
            .filter(|p| p.len() >= 4)
            .map(|p| i32::from_le_bytes([p[0], p[1], p[2], p[3]]))
            .unwrap_or(0))
    }

    /// Encryption type byte of the current association (NINA numbering).
    pub fn current_enct(&mut self) -> Result<u8, Error<S::Error>> {
        let responses = self.send_command_get_response(GET_CURR_ENCT_CMD, &[&[0xFF]])?;
        Ok(responses.first().and_then(|p| p.first()).copied().unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // GPIO passthrough
    // ------------------------------------------------------------------

    pub fn set_pin_mode(&mut self, pin: u8, pin_mode: u8) -> Result<(), Error<S::Error>> {
        self.check_success(SET_PIN_MODE_CMD, &[&[pin], &[pin_mode]], "set pin mode")
    }

    pub fn set_digital_write(&mut self, pin: u8, value: bool) -> Result<(), Error<S::Error>> {
        self.check_success(
            SET_DIGITAL_WRITE_CMD,
            &[&[pin], &[value as u8]],
            "digital write",
        )
    }

    pub fn set_analog_write(&mut self, pin: u8, value: u8) -> Result<(), Error<S::Error>> {
        self.check_success(SET_ANALOG_WRITE_CMD, &[&[pin], &[value]], "analog write")
    }

    pub fn set_digital_read(&mut self, pin: u8) -> Result<bool, Error<S::Error>> {
        let responses = self.send_command_get_response(SET_DIGITAL_READ_CMD, &[&[pin]])?;
        match responses.first().and_then(|p| p.first()) {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            Some(_) => Err(Error::CommandFailed("digital read")),
            None => Ok(false),
        }
    }

    /// ADC read via the co-processor; the raw 12-bit value is scaled to 16
    /// bits. A negative reading means the pin is not ADC-capable.
    pub fn set_analog_read(&mut self, pin: u8, atten: u8) -> Result<u16, Error<S::Error>> {
        let responses = self.send_command_get_response(SET_ANALOG_READ_CMD, &[&[pin], &[atten]])?;
        match responses.first().filter(|p| p.len() >= 4) {
            Some(p) => {
                let value = i32::from_le_bytes([p[0], p[1], p[2], p[3]]);
                if value < 0 {
                    return Err(Error::InvalidAnalogRead);
                }
                Ok((value as u32 * 16) as u16)
            }
            None => Ok(0),
        }
    }

    // ------------------------------------------------------------------
    // Network configuration
    // ------------------------------------------------------------------

    /// Join an open network by SSID alone.
    pub fn set_network(&mut self, ssid: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_NET_CMD, &[ssid], "set network")
    }

    pub fn set_passphrase(&mut self, ssid: &[u8], passphrase: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_PASSPHRASE_CMD, &[ssid, passphrase], "set passphrase")
    }

    /// Static IP configuration. The firmware sends no meaningful result
    /// byte for this one, so nothing is checked.
    pub fn set_ip_config(
        &mut self,
        ip: [u8; 4],
        gateway: [u8; 4],
        mask: [u8; 4],
    ) -> Result<(), Error<S::Error>> {
        self.send_command_get_response(SET_IP_CONFIG_CMD, &[&[0], &ip, &gateway, &mask])?;
        Ok(())
    }

    pub fn set_dns_config(&mut self, dns1: [u8; 4], dns2: [u8; 4]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_DNS_CONFIG_CMD, &[&[0], &dns1, &dns2], "set DNS")
    }

    pub fn set_hostname(&mut self, hostname: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_HOSTNAME_CMD, &[hostname], "set hostname")
    }

    // ------------------------------------------------------------------
    // WPA2 Enterprise
    // ------------------------------------------------------------------

    pub fn set_ent_identity(&mut self, identity: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_ENT_IDENT_CMD, &[identity], "set enterprise identity")
    }

    pub fn set_ent_username(&mut self, username: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_ENT_UNAME_CMD, &[username], "set enterprise username")
    }

    pub fn set_ent_password(&mut self, password: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_ENT_PASSWD_CMD, &[password], "set enterprise password")
    }

    pub fn set_ent_enable(&mut self) -> Result<(), Error<S::Error>> {
        self.check_success(SET_ENT_ENABLE_CMD, &[], "enable enterprise mode")
    }

    // ------------------------------------------------------------------
    // TLS credentials
    // ------------------------------------------------------------------

    pub fn set_certificate(&mut self, certificate: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_CLI_CERT_CMD, &[certificate], "set certificate")
    }

    pub fn set_private_key(&mut self, private_key: &[u8]) -> Result<(), Error<S::Error>> {
        self.check_success(SET_PK_CMD, &[private_key], "set private key")
    }

    // ------------------------------------------------------------------
    // Polling plumbing shared with the socket layer
    // ------------------------------------------------------------------

    pub(crate) fn now_ms(&mut self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn poll_pause(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
        self.clock.yield_background();
    }
}

fn take_ip4(responses: &[Vec<u8>]) -> [u8; 4] {
    let mut ip = [0u8; 4];
    if let Some(raw) = responses.first().filter(|p| p.len() >= 4) {
        ip.copy_from_slice(&raw[..4]);
    }
    ip
}
