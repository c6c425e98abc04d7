/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/

use crate::registers::{DeviceStatusBits, PLL};

/// Decoded device status register (register 0).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub initializing: bool,
    pub loss_of_lock_a: bool,
    pub loss_of_lock_b: bool,
    pub loss_of_clk_in: bool,
    pub loss_of_xtal: bool,
}

impl StatusFlags {
    pub fn decode(status: u8) -> Self {
        DeviceStatusBits::from_bits_truncate(status).into()
    }

    pub fn pll_locked(&self, pll: PLL) -> bool {
        match pll {
            PLL::A => !self.loss_of_lock_a,
            PLL::B => !self.loss_of_lock_b,
        }
    }

    /// No condition is raised.
    pub fn is_clear(&self) -> bool {
        *self == StatusFlags::default()
    }
}

impl From<DeviceStatusBits> for StatusFlags {
    fn from(bits: DeviceStatusBits) -> Self {
        StatusFlags {
            initializing: bits.contains(DeviceStatusBits::SYS_INIT),
            loss_of_lock_a: bits.contains(DeviceStatusBits::LOL_A),
            loss_of_lock_b: bits.contains(DeviceStatusBits::LOL_B),
            loss_of_clk_in: bits.contains(DeviceStatusBits::LOS_CLKIN),
            loss_of_xtal: bits.contains(DeviceStatusBits::LOS_XTAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializing_only() {
        let flags = StatusFlags::decode(0x80);
        assert_eq!(
            flags,
            StatusFlags {
                initializing: true,
                ..StatusFlags::default()
            }
        );
    }

    #[test]
    fn every_flag() {
        let flags = StatusFlags::decode(0xff);
        assert!(flags.initializing);
        assert!(flags.loss_of_lock_a);
        assert!(flags.loss_of_lock_b);
        assert!(flags.loss_of_clk_in);
        assert!(flags.loss_of_xtal);
        assert!(!flags.pll_locked(PLL::A));
        assert!(!flags.pll_locked(PLL::B));
    }

    #[test]
    fn nothing_raised() {
        let flags = StatusFlags::decode(0x00);
        assert!(flags.is_clear());
        assert!(flags.pll_locked(PLL::A));
    }

    #[test]
    fn revision_bits_are_ignored() {
        assert!(StatusFlags::decode(0b0000_0011).is_clear());
        let flags = StatusFlags::decode(0b0010_0001);
        assert!(flags.loss_of_lock_a);
        assert!(flags.pll_locked(PLL::B));
    }
}
