/// Fixed bus settings the co-processor firmware expects: 8 MHz, SPI mode 0
/// (CPOL=0, CPHA=0), MSB-first, 8-bit words.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub frequency_hz: u32,
    pub polarity: bool,
    pub phase: bool,
    pub bits: u8,
}

impl BusConfig {
    pub const fn nina_default() -> Self {
        Self {
            frequency_hz: 8_000_000,
            polarity: false,
            phase: false,
            bits: 8,
        }
    }
}

/// Shared-SPI-bus abstraction with the bus-locking semantics the driver
/// needs. The bus may be shared with other peripherals; chip-select is only
/// ever asserted while the lock is held.
pub trait SpiTransport {
    type Error;

    /// Attempt to take the bus lock without blocking.
    fn try_lock(&mut self) -> bool;

    /// Release the bus lock. Called exactly once per successful `try_lock`.
    fn unlock(&mut self);

    /// Apply clock/mode settings. Called after every lock acquisition, since
    /// another peripheral may have reconfigured the bus in between.
    fn configure(&mut self, config: BusConfig) -> Result<(), Self::Error>;

    /// Clock out `words` while discarding whatever comes back.
    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error>;

    /// Clock in `words.len()` bytes, transmitting `fill` for each.
    fn read(&mut self, words: &mut [u8], fill: u8) -> Result<(), Self::Error>;
}

/// The GPIO lines wired to the co-processor. Chip-select and reset are
/// outputs, ready is an input; the optional boot-mode pin (GPIO0) is driven
/// only around reset and floated otherwise.
pub trait ControlPins {
    /// Drive chip-select. `true` is deasserted (idle), `false` selects.
    fn set_chip_select(&mut self, level: bool);

    /// Sample the ready line. The co-processor pulls it low when willing to
    /// start a transaction and raises it once it sees chip-select fall.
    fn ready(&mut self) -> bool;

    /// Drive the reset line.
    fn set_reset(&mut self, level: bool);

    /// Whether a boot-mode pin is wired at all.
    fn has_gpio0(&self) -> bool {
        false
    }

    /// Drive the boot-mode pin as an output. No-op when not wired.
    fn gpio0_drive(&mut self, _level: bool) {}

    /// Float the boot-mode pin back to an input. No-op when not wired.
    fn gpio0_release(&mut self) {}
}

/// Monotonic time and cooperative waiting. Every busy-poll loop in the
/// driver calls `yield_background` once per iteration; on an embedded host
/// that hook runs the scheduler's periodic housekeeping.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Deadlines are computed from
    /// this at loop entry and checked every iteration.
    fn now_ms(&mut self) -> u64;

    /// Block for the given number of milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Suspension point for host housekeeping while the driver spins.
    fn yield_background(&mut self) {}
}
