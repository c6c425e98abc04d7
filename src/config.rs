/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/

use crate::codec::DriveStrength;
use crate::registers::{CrystalLoadBits, ADDRESS};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

impl CrystalLoad {
    pub(crate) fn bits(&self) -> CrystalLoadBits {
        CrystalLoadBits::RESERVED
            | match *self {
                CrystalLoad::_6 => CrystalLoadBits::CL_6,
                CrystalLoad::_8 => CrystalLoadBits::CL_8,
                CrystalLoad::_10 => CrystalLoadBits::CL_10,
            }
    }
}

/// Board level settings of one Si5351.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Crystal (or CLKIN) frequency feeding both PLLs.
    pub reference_hz: u32,
    /// State of the `A0` address pin.
    pub address_bit: bool,
    pub crystal_load: CrystalLoad,
    /// Drive strength written to every output by `init`.
    pub drive_strength: DriveStrength,
    /// Status reads `init` makes while the device reports `SYS_INIT`.
    pub init_poll_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reference_hz: 25_000_000,
            address_bit: false,
            crystal_load: CrystalLoad::_10,
            drive_strength: DriveStrength::_8mA,
            init_poll_limit: 1000,
        }
    }
}

impl Config {
    /// Adafruit Si5351 breakout: 25 MHz crystal, 10 pF load, `A0` low.
    pub fn adafruit_module() -> Self {
        Config::default()
    }

    pub fn with_reference_hz(mut self, reference_hz: u32) -> Self {
        self.reference_hz = reference_hz;
        self
    }

    pub fn with_address_bit(mut self, address_bit: bool) -> Self {
        self.address_bit = address_bit;
        self
    }

    pub fn with_crystal_load(mut self, crystal_load: CrystalLoad) -> Self {
        self.crystal_load = crystal_load;
        self
    }

    pub fn with_drive_strength(mut self, drive_strength: DriveStrength) -> Self {
        self.drive_strength = drive_strength;
        self
    }

    pub fn with_init_poll_limit(mut self, init_poll_limit: u32) -> Self {
        self.init_poll_limit = init_poll_limit;
        self
    }

    pub fn i2c_address(&self) -> u8 {
        ADDRESS | if self.address_bit { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adafruit_defaults() {
        let config = Config::adafruit_module();
        assert_eq!(config.reference_hz, 25_000_000);
        assert_eq!(config.i2c_address(), 0x60);
        assert_eq!(config.crystal_load.bits().bits(), 0b1101_0010);
    }

    #[test]
    fn builder() {
        let config = Config::default()
            .with_reference_hz(27_000_000)
            .with_address_bit(true)
            .with_crystal_load(CrystalLoad::_8)
            .with_drive_strength(DriveStrength::_4mA)
            .with_init_poll_limit(3);
        assert_eq!(config.i2c_address(), 0x61);
        assert_eq!(config.crystal_load.bits().bits(), 0b1001_0010);
        assert_eq!(config.reference_hz, 27_000_000);
        assert_eq!(config.drive_strength, DriveStrength::_4mA);
        assert_eq!(config.init_poll_limit, 3);
    }
}
