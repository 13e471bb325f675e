// This code is provided under the MIT license.

//! Device agnostic driver for the HMC5883L and QMC5883L triaxial magnetometers.
//! The two chips are pin compatible and frequently sold on the same breakout boards,
//! so both drivers sit behind one trait and produce the same kind of sample.
//!
//! The drivers talk to the bus through the [`mag5883::bus::MagBus`] transport trait.
//! An adapter over the embedded-hal I2C and delay traits is provided, so as long as
//! the HAL you use implements those traits this driver should be compatible.
//!
//! The HMC5883L data sheet can be found [here](https://cdn-shop.adafruit.com/datasheets/HMC5883L_3-Axis_Digital_Compass_IC.pdf)
//! and the QMC5883L data sheet [here](https://github.com/e-Gizmo/QMC5883L-GY-271-Compass-module/blob/master/QMC5883L%20Datasheet%201.0%20.pdf).
//!
//! Readings are reported in raw counts. Divide by the configured gain
//! (counts per gauss) to get field strength.
//!
//! You can instantiate multiple objects if you have multiple sensors. A driver
//! can either own its bus or borrow it for the driver's lifetime; sharing one
//! physical bus between drivers is the caller's responsibility.

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

/// Main module that holds the two sensor drivers.
/// Also holds the sample type, the bus abstraction and the trait the drivers share.
pub mod mag5883;
