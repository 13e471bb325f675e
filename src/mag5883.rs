// This code is provided under the MIT license.

/// The bus module holds the two-wire transport contract the drivers consume,
/// plus an adapter over the embedded-hal I2C and delay traits
pub mod bus;

/// The hmc module holds the driver for the HMC5883L (register rich, auto-ranging)
pub mod hmc;

/// The qmc module holds the driver for the QMC5883L (simplified, fixed dual gain)
pub mod qmc;

mod bits;

#[cfg(test)]
pub(crate) mod mock;

/// Reserved axis value meaning the axis saturated or the sensor reported an
/// error/overflow. Both variants normalize their native overflow encoding to
/// this sentinel.
pub const SATURATED: i16 = i16::MIN;

const BYTES_PER_SAMPLE: usize = 6;
const STOP_AFTER_SEND: bool = true;

/// One triaxial magnetometer sample in raw counts.
///
/// The driver writes into a caller supplied sample and never keeps a reference,
/// so one instance can be reused across reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorData {
    /// X axis reading
    pub x: i16,
    /// Y axis reading
    pub y: i16,
    /// Z axis reading
    pub z: i16,
}

impl SensorData {
    /// Sets all three axes back to zero.
    pub fn reset(&mut self) {
        *self = SensorData::default();
    }

    /// Returns true if any axis carries the saturation sentinel.
    pub fn is_saturated(&self) -> bool {
        self.x == SATURATED || self.y == SATURATED || self.z == SATURATED
    }
}

/// The possible errors that the drivers can return.
///
/// The `BusError` option is for when a transport transaction fails.
/// This may be caused by a number of reasons. For example, using the wrong
/// 7-bit address will cause a bus error.
///
/// `Timeout` means the transport did not deliver a full sample before the
/// read deadline. The sample must not be trusted; calling `read` again is the
/// recovery path.
#[derive(Debug, PartialEq, Eq)]
pub enum MagError<E> {
    /// An error occurred when using the bus
    BusError(E),
    /// The sensor did not deliver a full sample before the read deadline
    Timeout,
}

impl<E> From<E> for MagError<E> {
    fn from(error: E) -> Self {
        MagError::BusError(error)
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for MagError<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match *self {
            MagError::BusError(_) => defmt::write!(fmt, "Bus Error!"),
            MagError::Timeout => defmt::write!(fmt, "Timed out waiting for sample bytes!"),
        }
    }
}

/// The capability set every magnetometer variant exposes.
///
/// Configuration setters are variant specific and live on the concrete
/// drivers; everything needed to poll a configured sensor is here.
pub trait MagnetoSensor {
    /// Error type produced by the driver.
    type Error;
    /// The variant's measurement range enumeration.
    type Range;

    /// Performs the variant's power-on handling and leaves the device in
    /// measurement mode. The returned flag is the power-on verdict: the
    /// self-test outcome on variants that have one, otherwise true.
    /// A false verdict leaves the device in its normal configuration.
    fn begin(&mut self) -> Result<bool, Self::Error>;

    /// Pulls one sample from the device into `sample`.
    fn read(&mut self, sample: &mut SensorData) -> Result<(), Self::Error>;

    /// Counts per gauss implied by the configured range.
    fn gain(&self) -> f32;

    /// Estimated noise floor in raw counts for the configured range.
    fn noise_range(&self) -> i16;

    /// Currently configured range.
    fn range(&self) -> Self::Range;

    /// Re-applies the configuration to the device registers, discarding any
    /// partially applied state. The device measures again afterwards.
    fn soft_reset(&mut self) -> Result<(), Self::Error>;

    /// Returns true if a device acknowledges its address on the bus.
    fn is_on(&mut self) -> bool;
}
