//! Adapters from `embedded-hal` 1.0 traits to the driver's backend seams.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use crate::backend::{BusConfig, Clock, ControlPins, SpiTransport};

/// Exclusively-owned `SpiBus`. There is no contention, so locking is a
/// no-op, and the bus is assumed to be configured for NINA timing
/// (8 MHz, mode 0, MSB-first) at construction.
pub struct ExclusiveBus<B> {
    bus: B,
}

impl<B> ExclusiveBus<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: SpiBus<u8>> SpiTransport for ExclusiveBus<B> {
    type Error = B::Error;

    fn try_lock(&mut self) -> bool {
        true
    }

    fn unlock(&mut self) {}

    fn configure(&mut self, _config: BusConfig) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(words)?;
        self.bus.flush()
    }

    fn read(&mut self, words: &mut [u8], fill: u8) -> Result<(), Self::Error> {
        words.fill(fill);
        self.bus.transfer_in_place(words)?;
        self.bus.flush()
    }
}

/// Chip-select, ready, and reset lines as `embedded-hal` digital pins.
/// A pin read error is reported as not-ready and gets caught by the
/// driver's handshake timeout. The boot-mode pin is not modeled; wire it
/// high externally if the board needs it.
pub struct Pins<CS, RDY, RST> {
    cs: CS,
    ready: RDY,
    reset: RST,
}

impl<CS, RDY, RST> Pins<CS, RDY, RST> {
    pub fn new(cs: CS, ready: RDY, reset: RST) -> Self {
        Self { cs, ready, reset }
    }

    pub fn release(self) -> (CS, RDY, RST) {
        (self.cs, self.ready, self.reset)
    }
}

impl<CS, RDY, RST> ControlPins for Pins<CS, RDY, RST>
where
    CS: OutputPin,
    RDY: InputPin,
    RST: OutputPin,
{
    fn set_chip_select(&mut self, level: bool) {
        let _ = if level {
            self.cs.set_high()
        } else {
            self.cs.set_low()
        };
    }

    fn ready(&mut self) -> bool {
        self.ready.is_high().unwrap_or(false)
    }

    fn set_reset(&mut self, level: bool) {
        let _ = if level {
            self.reset.set_high()
        } else {
            self.reset.set_low()
        };
    }
}

/// Millisecond clock synthesized from a `DelayNs`.
///
/// `embedded-hal` has no time-source trait, so elapsed time is accounted
/// from this clock's own delays plus one tick per observation. Timeout
/// windows therefore bound poll counts rather than wall time; supply a
/// real [`Clock`] implementation when the platform has one.
pub struct DelayClock<D> {
    delay: D,
    elapsed_ms: u64,
}

impl<D> DelayClock<D> {
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            elapsed_ms: 0,
        }
    }

    pub fn release(self) -> D {
        self.delay
    }
}

impl<D: DelayNs> Clock for DelayClock<D> {
    fn now_ms(&mut self) -> u64 {
        self.elapsed_ms += 1;
        self.elapsed_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
        self.elapsed_ms += u64::from(ms);
    }
}
