//! In-memory co-processor double for tests and the host simulator.
//!
//! [`MockEsp`] models the slave side of the bus: it captures every request
//! frame the driver clocks out and serves reply bytes from a scripted
//! queue. The ready line is derived from chip-select (ready goes high once
//! selected, low when idle), which satisfies the driver's handshake without
//! any timing model.

use core::cell::RefCell;
use core::convert::Infallible;

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::{collections::VecDeque, rc::Rc};
#[cfg(feature = "std")]
use std::{collections::VecDeque, rc::Rc};

use crate::backend::{BusConfig, Clock, ControlPins, SpiTransport};
use crate::Vec;

struct MockEspState {
    replies: VecDeque<u8>,
    frames: Vec<Vec<u8>>,
    cs_high: bool,
    locked: bool,
    ready_stuck_high: bool,
    now_ms: u64,
    frames_written: usize,
    bytes_read: usize,
    lock_cycles: usize,
    last_config: Option<BusConfig>,
}

/// Scripted co-processor double. Clone handles out with
/// [`MockEsp::handles`] and hand those to the driver; keep the `MockEsp`
/// itself for scripting and inspection.
pub struct MockEsp {
    inner: Rc<RefCell<MockEspState>>,
}

#[derive(Debug, Clone, Copy)]
pub struct MockEspStats {
    pub frames_written: usize,
    pub bytes_read: usize,
    pub lock_cycles: usize,
    pub last_time_ms: u64,
}

impl MockEsp {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MockEspState {
                replies: VecDeque::new(),
                frames: Vec::new(),
                cs_high: true,
                locked: false,
                ready_stuck_high: false,
                now_ms: 0,
                frames_written: 0,
                bytes_read: 0,
                lock_cycles: 0,
                last_config: None,
            })),
        }
    }

    /// Backend handles for [`crate::driver::SpiDriver::new`].
    pub fn handles(&self) -> (MockSpi, MockPins, MockClock) {
        (
            MockSpi(self.inner.clone()),
            MockPins(self.inner.clone()),
            MockClock(self.inner.clone()),
        )
    }

    /// Queue raw bytes to be clocked back to the driver.
    pub fn queue_raw(&self, bytes: &[u8]) {
        self.inner.borrow_mut().replies.extend(bytes.iter().copied());
    }

    /// Queue a well-formed reply frame for `cmd` with the given parameters.
    pub fn queue_response(&self, cmd: u8, params: &[&[u8]]) {
        let frame = crate::encode_response(cmd, params);
        self.queue_raw(&frame);
    }

    /// Queue a bulk reply frame (16-bit length) for `cmd`.
    pub fn queue_bulk_response(&self, cmd: u8, payload: &[u8]) {
        let frame = crate::encode_bulk_response(cmd, payload);
        self.queue_raw(&frame);
    }

    /// Make the ready line read high forever, so the driver's wait for an
    /// idle co-processor times out.
    pub fn set_ready_stuck_high(&self, stuck: bool) {
        self.inner.borrow_mut().ready_stuck_high = stuck;
    }

    /// Request frames captured so far, oldest first.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.inner.borrow().frames.clone()
    }

    /// Drain and return the captured request frames.
    pub fn take_frames(&self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.inner.borrow_mut().frames)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.borrow().locked
    }

    /// Bus configuration most recently applied by the driver.
    pub fn last_config(&self) -> Option<BusConfig> {
        self.inner.borrow().last_config
    }

    pub fn stats(&self) -> MockEspStats {
        let state = self.inner.borrow();
        MockEspStats {
            frames_written: state.frames_written,
            bytes_read: state.bytes_read,
            lock_cycles: state.lock_cycles,
            last_time_ms: state.now_ms,
        }
    }
}

impl Default for MockEsp {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockSpi(Rc<RefCell<MockEspState>>);
pub struct MockPins(Rc<RefCell<MockEspState>>);
pub struct MockClock(Rc<RefCell<MockEspState>>);

impl SpiTransport for MockSpi {
    type Error = Infallible;

    fn try_lock(&mut self) -> bool {
        let mut state = self.0.borrow_mut();
        if state.locked {
            return false;
        }
        state.locked = true;
        state.lock_cycles += 1;
        true
    }

    fn unlock(&mut self) {
        self.0.borrow_mut().locked = false;
    }

    fn configure(&mut self, config: BusConfig) -> Result<(), Self::Error> {
        self.0.borrow_mut().last_config = Some(config);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.frames.push(words.to_vec());
        state.frames_written += 1;
        Ok(())
    }

    fn read(&mut self, words: &mut [u8], fill: u8) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        for word in words.iter_mut() {
            *word = state.replies.pop_front().unwrap_or(fill);
        }
        state.bytes_read += words.len();
        Ok(())
    }
}

impl ControlPins for MockPins {
    fn set_chip_select(&mut self, level: bool) {
        self.0.borrow_mut().cs_high = level;
    }

    fn ready(&mut self) -> bool {
        let state = self.0.borrow();
        if state.ready_stuck_high {
            return true;
        }
        // Ready mirrors selection: low while idle, high once selected.
        !state.cs_high
    }

    fn set_reset(&mut self, _level: bool) {}
}

impl Clock for MockClock {
    fn now_ms(&mut self) -> u64 {
        // Each observation advances time so deadline loops terminate.
        let mut state = self.0.borrow_mut();
        state.now_ms += 1;
        state.now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().now_ms += u64::from(ms);
    }
}
