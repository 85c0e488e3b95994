//! Blocking client sockets over the command façade.
//!
//! A [`Socket`] is a plain handle plus local state; it borrows the driver
//! for each call rather than owning it, so several sockets can share one
//! radio.

use crate::backend::{Clock, ControlPins, SpiTransport};
use crate::driver::SpiDriver;
use crate::{ConnectMode, Error, TcpState, SOCKET_CONNECT_TIMEOUT_MS, SOCKET_POLL_MS};

/// One client socket on the co-processor. Dropping it does not close the
/// underlying socket; call [`Socket::close`].
pub struct Socket {
    number: u8,
    mode: ConnectMode,
    connected: bool,
    /// Receive timeout in milliseconds. Zero means non-blocking.
    timeout_ms: u64,
}

impl Socket {
    /// Claim a free socket handle from the co-processor.
    pub fn open<S, P, C>(
        driver: &mut SpiDriver<S, P, C>,
        mode: ConnectMode,
    ) -> Result<Self, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        let number = driver.get_socket()?;
        Ok(Self {
            number,
            mode,
            connected: false,
            timeout_ms: 0,
        })
    }

    /// Raw socket number on the co-processor.
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Set the receive timeout. Zero (the default) makes
    /// [`Socket::recv_into`] return whatever is immediately available,
    /// possibly nothing. A nonzero value also becomes the connect deadline.
    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Connect to `dest` (raw IPv4 bytes or hostname). TCP and TLS poll the
    /// reported state until established or the deadline expires; UDP has no
    /// connection state and is connected as soon as the command succeeds.
    pub fn connect<S, P, C>(
        &mut self,
        driver: &mut SpiDriver<S, P, C>,
        dest: &[u8],
        port: u16,
    ) -> Result<(), Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        driver.socket_connect(self.number, dest, port, self.mode)?;

        if self.mode == ConnectMode::Udp {
            self.connected = true;
            return Ok(());
        }

        let timeout = if self.timeout_ms > 0 {
            self.timeout_ms
        } else {
            SOCKET_CONNECT_TIMEOUT_MS
        };
        let start = driver.now_ms();
        while driver.now_ms().wrapping_sub(start) < timeout {
            if driver.socket_status(self.number)? == TcpState::Established {
                self.connected = true;
                return Ok(());
            }
            driver.poll_pause(SOCKET_POLL_MS);
        }
        Err(Error::SocketConnectTimeout)
    }

    /// Send the whole buffer. Fails with `NotConnected` before touching the
    /// bus if the socket was never connected.
    pub fn send<S, P, C>(
        &mut self,
        driver: &mut SpiDriver<S, P, C>,
        buf: &[u8],
    ) -> Result<usize, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        driver.socket_write(self.number, buf, self.mode)?;
        Ok(buf.len())
    }

    /// Bytes currently buffered on the co-processor for this socket.
    pub fn available<S, P, C>(
        &mut self,
        driver: &mut SpiDriver<S, P, C>,
    ) -> Result<u16, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        driver.socket_available(self.number)
    }

    /// Receive into `buf`, blocking up to the configured timeout. The
    /// timeout window restarts whenever data arrives, so a slow but live
    /// peer is not cut off mid-stream. A deadline expiry with nothing read
    /// is `Error::RecvTimeout`; zero bytes with `Ok` means a non-blocking
    /// pass found nothing or the peer has closed.
    pub fn recv_into<S, P, C>(
        &mut self,
        driver: &mut SpiDriver<S, P, C>,
        buf: &mut [u8],
    ) -> Result<usize, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let mut received = 0usize;
        let mut window_start = driver.now_ms();
        while received < buf.len() {
            let avail = driver.socket_available(self.number)? as usize;
            if avail > 0 {
                let n = driver.socket_read(self.number, &mut buf[received..])?;
                received += n;
                window_start = driver.now_ms();
                continue;
            }

            if received > 0 {
                break;
            }
            if driver.socket_status(self.number)? == TcpState::Closed {
                self.connected = false;
                break;
            }
            if self.timeout_ms == 0 {
                break;
            }
            if driver.now_ms().wrapping_sub(window_start) >= self.timeout_ms {
                return Err(Error::RecvTimeout);
            }
            driver.poll_pause(SOCKET_POLL_MS);
        }
        Ok(received)
    }

    /// Close the socket on the co-processor and mark it disconnected.
    pub fn close<S, P, C>(&mut self, driver: &mut SpiDriver<S, P, C>)
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        driver.socket_close(self.number);
        self.connected = false;
    }
}
