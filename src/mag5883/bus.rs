// This code is provided under the MIT license.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

/// Two-wire transport contract the sensor drivers consume.
///
/// The shape follows the classic Wire bus model: write a register address,
/// request a number of bytes, then consume them one at a time once they are
/// reported available. The microsecond clock backs the HMC5883L read
/// deadline and must be monotonic (wrapping is fine).
///
/// A `&mut` reference to a bus is itself a bus, so a driver can borrow a
/// transport owned elsewhere instead of taking it over.
pub trait MagBus {
    /// Error type for failed transactions.
    type Error;

    /// Sends `bytes` to the device at `addr` in a single transaction.
    /// An empty payload is a plain address probe.
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Asks the device at `addr` for `count` bytes. `stop` requests a stop
    /// condition after the transfer. The bytes become observable through
    /// [`MagBus::available`] and are consumed with [`MagBus::read_byte`].
    fn request_from(&mut self, addr: u8, count: usize, stop: bool) -> Result<(), Self::Error>;

    /// Number of requested bytes buffered and not yet consumed.
    fn available(&mut self) -> usize;

    /// Consumes one buffered byte. Returns 0 when nothing is buffered.
    fn read_byte(&mut self) -> u8;

    /// Monotonic microsecond timestamp. Wraps around at `u32::MAX`.
    fn micros(&mut self) -> u32;

    /// Blocks for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

impl<T: MagBus + ?Sized> MagBus for &mut T {
    type Error = T::Error;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(addr, bytes)
    }

    fn request_from(&mut self, addr: u8, count: usize, stop: bool) -> Result<(), Self::Error> {
        (**self).request_from(addr, count, stop)
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> u8 {
        (**self).read_byte()
    }

    fn micros(&mut self) -> u32 {
        (**self).micros()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Monotonic microsecond time source for [`I2cBus`].
///
/// embedded-hal has no clock trait, so the adapter takes one of these.
/// Any `FnMut() -> u32` closure qualifies.
pub trait MicrosClock {
    /// Current timestamp in microseconds; wrapping is fine.
    fn now_us(&mut self) -> u32;
}

impl<F: FnMut() -> u32> MicrosClock for F {
    fn now_us(&mut self) -> u32 {
        self()
    }
}

const RX_CAPACITY: usize = 8;

/// [`MagBus`] adapter over an embedded-hal I2C bus, a delay provider and a
/// microsecond clock.
///
/// `request_from` performs the blocking read immediately and buffers the
/// result, so `available` reports the full count as soon as the transfer
/// finished. Requests are capped at 8 bytes, enough for a 6-byte sample.
pub struct I2cBus<I2C, D, C> {
    i2c: I2C,
    delay: D,
    clock: C,
    rx: [u8; RX_CAPACITY],
    len: usize,
    pos: usize,
}

impl<I2C, D, C> I2cBus<I2C, D, C> {
    /// Creates an adapter from its three parts.
    pub fn new(i2c: I2C, delay: D, clock: C) -> Self {
        I2cBus {
            i2c,
            delay,
            clock,
            rx: [0; RX_CAPACITY],
            len: 0,
            pos: 0,
        }
    }

    /// Releases the wrapped parts.
    pub fn destroy(self) -> (I2C, D, C) {
        (self.i2c, self.delay, self.clock)
    }
}

impl<I2C, D, C, E> MagBus for I2cBus<I2C, D, C>
where
    I2C: I2c<SevenBitAddress, Error = E>,
    D: DelayNs,
    C: MicrosClock,
{
    type Error = E;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(addr, bytes)
    }

    // embedded-hal reads always issue a stop condition, so `stop` is moot here
    fn request_from(&mut self, addr: u8, count: usize, _stop: bool) -> Result<(), Self::Error> {
        let count = count.min(RX_CAPACITY);
        self.i2c.read(addr, &mut self.rx[..count])?;
        self.len = count;
        self.pos = 0;
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.len - self.pos
    }

    fn read_byte(&mut self) -> u8 {
        if self.pos < self.len {
            let byte = self.rx[self.pos];
            self.pos += 1;
            byte
        } else {
            0
        }
    }

    fn micros(&mut self) -> u32 {
        self.clock.now_us()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}
