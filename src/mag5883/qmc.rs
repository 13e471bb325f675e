// This code is provided under the MIT license.

use crate::mag5883::bits::{QmcControl1, QmcControl2};
use crate::mag5883::bus::MagBus;
use crate::mag5883::{MagError, MagnetoSensor, SensorData};
use crate::mag5883::{BYTES_PER_SAMPLE, SATURATED, STOP_AFTER_SEND};

/// Default 7-bit bus address of the QMC5883L.
pub const QMC_ADDRESS: u8 = 0x0D;

// recommended SET/RESET period, must be written before control register 1
// or the device stays uncalibrated
const SET_RESET_PERIOD: u8 = 0x01;

const QMC_CONTINUOUS: u8 = 0x01;

const DATA_READY: u8 = 0x01;

enum QmcRegister {
    Data = 0x00,
    Status = 0x06,
    Control1 = 0x09,
    Control2 = 0x0A,
    SetReset = 0x0B,
}

/// Measurement range options in gauss.
///
/// The two gains are asymmetric: ±8 G maps to 3000 counts per gauss and
/// ±2 G to 12000, not a linear table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QmcRange {
    /// ±2 G
    Gauss2 = 0,
    /// ±8 G (driver default)
    Gauss8 = 1,
}

/// Data output rate options in continuous mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QmcRate {
    /// 10 Hz
    Hz10 = 0,
    /// 50 Hz
    Hz50 = 1,
    /// 100 Hz (driver default)
    Hz100 = 2,
    /// 200 Hz
    Hz200 = 3,
}

/// Over sample ratio options. A higher ratio means less noise and more power.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QmcOverSampling {
    /// 512 samples (driver default)
    Sampling512 = 0,
    /// 256 samples
    Sampling256 = 1,
    /// 128 samples
    Sampling128 = 2,
    /// 64 samples
    Sampling64 = 3,
}

/// QMC5883L driver returning the raw readings.
///
/// Instantiate it with the transport, adjust the configuration if the
/// defaults (±8 G, 100 Hz, 512 samples) don't fit, then call
/// [`Qmc5883::begin`]. The device converts continuously afterwards; there is
/// no self test on this variant.
pub struct Qmc5883<BUS> {
    bus: BUS,
    addr: u8,
    range: QmcRange,
    rate: QmcRate,
    over_sampling: QmcOverSampling,
}

impl<BUS, E> Qmc5883<BUS>
where
    BUS: MagBus<Error = E>,
{
    /// Creates a driver on the default device address.
    pub fn new(bus: BUS) -> Self {
        Self::with_address(bus, QMC_ADDRESS)
    }

    /// Creates a driver on a non-default device address.
    pub fn with_address(bus: BUS, addr: u8) -> Self {
        Qmc5883 {
            bus,
            addr,
            range: QmcRange::Gauss8,
            rate: QmcRate::Hz100,
            over_sampling: QmcOverSampling::Sampling512,
        }
    }

    /// Releases the transport.
    pub fn destroy(self) -> BUS {
        self.bus
    }

    /// Configures the range if not the default. Call before [`Qmc5883::begin`];
    /// afterwards the device keeps measuring at the old range until the next
    /// [`Qmc5883::soft_reset`].
    pub fn set_range(&mut self, range: QmcRange) {
        self.range = range;
    }

    /// Configures the rate if not the default. Call before [`Qmc5883::begin`].
    pub fn set_rate(&mut self, rate: QmcRate) {
        self.rate = rate;
    }

    /// Configures oversampling if not the default. Call before [`Qmc5883::begin`].
    pub fn set_over_sampling(&mut self, over_sampling: QmcOverSampling) {
        self.over_sampling = over_sampling;
    }

    /// Currently configured range.
    pub fn range(&self) -> QmcRange {
        self.range
    }

    /// Counts per gauss for the configured range.
    pub fn gain(&self) -> f32 {
        Self::gain_for(self.range)
    }

    /// Counts per gauss for `range`.
    pub fn gain_for(range: QmcRange) -> f32 {
        match range {
            QmcRange::Gauss8 => 3000.0,
            QmcRange::Gauss2 => 12000.0,
        }
    }

    /// Estimated noise floor in raw counts.
    ///
    /// A constant for this variant, only checked against the ±8 G range.
    pub fn noise_range(&self) -> i16 {
        60
    }

    /// Returns true if a device acknowledges the address on the bus.
    pub fn is_on(&mut self) -> bool {
        self.bus.write(self.addr, &[]).is_ok()
    }

    /// Writes the configuration to the device and starts continuous
    /// measurement. Power-on handling for this variant is just this.
    pub fn begin(&mut self) -> Result<bool, MagError<E>> {
        self.configure()?;
        Ok(true)
    }

    /// Pulls one sample from the device.
    ///
    /// Waits for the 6-byte payload with no deadline: the device converts
    /// continuously and is expected to have data ready, but a transport that
    /// never delivers will hang this call. Wrap it externally if you need a
    /// bound.
    pub fn read(&mut self, sample: &mut SensorData) -> Result<(), MagError<E>> {
        self.bus.write(self.addr, &[QmcRegister::Data as u8])?;
        self.bus
            .request_from(self.addr, BYTES_PER_SAMPLE, STOP_AFTER_SEND)?;

        while self.bus.available() < BYTES_PER_SAMPLE {}

        // wire order is x, y, z with two registers per axis
        sample.x = self.read_word();
        sample.y = self.read_word();
        sample.z = self.read_word();
        Ok(())
    }

    /// Reads the status register and reports whether a new sample is ready.
    pub fn data_ready(&mut self) -> Result<bool, MagError<E>> {
        self.bus.write(self.addr, &[QmcRegister::Status as u8])?;
        self.bus.request_from(self.addr, 1, STOP_AFTER_SEND)?;
        while self.bus.available() < 1 {}
        Ok(self.bus.read_byte() & DATA_READY != 0)
    }

    /// Issues the hardware soft-reset command, then re-applies the
    /// configuration so the device measures again.
    pub fn soft_reset(&mut self) -> Result<(), MagError<E>> {
        let mut control_2 = QmcControl2(0);
        control_2.set_soft_rst(true);
        self.set_register(QmcRegister::Control2, control_2.0)?;
        self.configure()
    }

    fn configure(&mut self) -> Result<(), MagError<E>> {
        self.set_register(QmcRegister::SetReset, SET_RESET_PERIOD)?;

        let mut control_1 = QmcControl1(0);
        control_1.set_over_sampling(self.over_sampling as u8);
        control_1.set_range(self.range as u8);
        control_1.set_rate(self.rate as u8);
        control_1.set_mode(QMC_CONTINUOUS);
        self.set_register(QmcRegister::Control1, control_1.0)
    }

    fn set_register(&mut self, register: QmcRegister, value: u8) -> Result<(), MagError<E>> {
        self.bus.write(self.addr, &[register as u8, value])?;
        Ok(())
    }

    fn read_word(&mut self) -> i16 {
        // read order matters, every call consumes a buffered byte
        let low = self.bus.read_byte();
        let high = self.bus.read_byte();
        Self::word_from(low, high)
    }

    // LSB first; a positive saturation is shifted to the sentinel because
    // i16::MAX means an error on this device
    fn word_from(low: u8, high: u8) -> i16 {
        let result = i16::from_le_bytes([low, high]);
        if result == i16::MAX {
            SATURATED
        } else {
            result
        }
    }
}

impl<BUS, E> MagnetoSensor for Qmc5883<BUS>
where
    BUS: MagBus<Error = E>,
{
    type Error = MagError<E>;
    type Range = QmcRange;

    fn begin(&mut self) -> Result<bool, Self::Error> {
        self.begin()
    }

    fn read(&mut self, sample: &mut SensorData) -> Result<(), Self::Error> {
        self.read(sample)
    }

    fn gain(&self) -> f32 {
        self.gain()
    }

    fn noise_range(&self) -> i16 {
        self.noise_range()
    }

    fn range(&self) -> QmcRange {
        self.range()
    }

    fn soft_reset(&mut self) -> Result<(), Self::Error> {
        self.soft_reset()
    }

    fn is_on(&mut self) -> bool {
        self.is_on()
    }
}

#[cfg(feature = "defmt")]
impl<BUS> defmt::Format for Qmc5883<BUS> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QMC5883L magnetometer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mag5883::mock::MockBus;

    type Driver<'a> = Qmc5883<&'a mut MockBus>;

    #[test]
    fn words_decode_lsb_first() {
        assert_eq!(Driver::word_from(0x00, 0x01), 256);
        assert_eq!(Driver::word_from(0x90, 0x01), 400);
    }

    #[test]
    fn positive_saturation_normalizes_to_sentinel() {
        // exactly i16::MAX
        assert_eq!(Driver::word_from(0xFF, 0x7F), SATURATED);
        // one below passes through
        assert_eq!(Driver::word_from(0xFE, 0x7F), 32766);
        // negative values pass through, there is no threshold on this variant
        assert_eq!(Driver::word_from(0x00, 0xF0), -4096);
        assert_eq!(Driver::word_from(0x00, 0x80), SATURATED); // genuine i16::MIN stays the sentinel
    }

    #[test]
    fn begin_writes_set_reset_before_control() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        assert_eq!(sensor.begin(), Ok(true));
        drop(sensor);

        assert_eq!(bus.writes[0], (QMC_ADDRESS, vec![0x0B, 0x01]));
        // 512 samples | 8 G | 100 Hz | continuous
        assert_eq!(bus.writes[1], (QMC_ADDRESS, vec![0x09, 0x19]));
    }

    #[test]
    fn configuration_setters_change_the_control_byte() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        sensor.set_range(QmcRange::Gauss2);
        sensor.set_rate(QmcRate::Hz10);
        sensor.set_over_sampling(QmcOverSampling::Sampling64);
        sensor.begin().unwrap();
        drop(sensor);

        // 64 samples | 2 G | 10 Hz | continuous
        assert_eq!(bus.writes[1], (QMC_ADDRESS, vec![0x09, 0xC1]));
    }

    #[test]
    fn read_maps_wire_order_to_axes() {
        let mut bus = MockBus::new();
        bus.push_response(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
        let mut sensor = Qmc5883::new(&mut bus);
        let mut sample = SensorData::default();

        sensor.read(&mut sample).unwrap();
        drop(sensor);

        assert_eq!(sample, SensorData { x: 256, y: 512, z: 768 });
        assert_eq!(bus.writes[0], (QMC_ADDRESS, vec![0x00]));
    }

    #[test]
    fn soft_reset_issues_the_command_then_reconfigures() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        sensor.soft_reset().unwrap();
        drop(sensor);

        assert_eq!(bus.writes[0], (QMC_ADDRESS, vec![0x0A, 0x80]));
        assert_eq!(bus.writes[1], (QMC_ADDRESS, vec![0x0B, 0x01]));
        assert_eq!(bus.writes[2], (QMC_ADDRESS, vec![0x09, 0x19]));
    }

    #[test]
    fn gain_is_asymmetric_across_the_two_ranges() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        assert_eq!(sensor.gain(), 3000.0);
        sensor.set_range(QmcRange::Gauss2);
        assert_eq!(sensor.gain(), 12000.0);
        assert_eq!(Driver::gain_for(QmcRange::Gauss8), 3000.0);
        assert_eq!(Driver::gain_for(QmcRange::Gauss2), 12000.0);
    }

    #[test]
    fn noise_range_is_constant() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        assert_eq!(sensor.noise_range(), 60);
        sensor.set_range(QmcRange::Gauss2);
        assert_eq!(sensor.noise_range(), 60);
    }

    #[test]
    fn data_ready_reads_the_status_bit() {
        let mut bus = MockBus::new();
        bus.push_response(&[0x01]);
        bus.push_response(&[0x04]);
        let mut sensor = Qmc5883::new(&mut bus);
        assert_eq!(sensor.data_ready(), Ok(true));
        assert_eq!(sensor.data_ready(), Ok(false));
        drop(sensor);
        assert_eq!(bus.writes[0], (QMC_ADDRESS, vec![0x06]));
    }

    #[test]
    fn trait_surface_matches_the_inherent_one() {
        let mut bus = MockBus::new();
        let mut sensor = Qmc5883::new(&mut bus);
        assert_eq!(MagnetoSensor::begin(&mut sensor), Ok(true));
        assert_eq!(MagnetoSensor::range(&sensor), QmcRange::Gauss8);
        assert_eq!(MagnetoSensor::gain(&sensor), 3000.0);
        assert_eq!(MagnetoSensor::noise_range(&sensor), 60);
        assert!(MagnetoSensor::is_on(&mut sensor));
    }
}
