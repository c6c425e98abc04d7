/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Register addresses and named bits of the Si5351.

use crate::Error;

/// 7-bit I²C address with the `A0` pin low.
pub const ADDRESS: u8 = 0b0110_0000;

/// Distance between two consecutive multisynth parameter blocks.
pub const MULTISYNTH_STRIDE: u8 = 8;

/// Number of bytes in one fractional divider parameter block.
pub const DIVIDER_BLOCK_LEN: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    DeviceStatus = 0,
    OutputEnable = 3,
    ClockControlBase = 16,
    PllA = 26,
    PllB = 34,
    MultisynthBase = 42,
    PhaseOffsetBase = 165,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PLL {
    A,
    B,
}

impl PLL {
    /// First register of the feedback multisynth (MSNA/MSNB) parameter block.
    pub fn base_addr(&self) -> u8 {
        match *self {
            PLL::A => Register::PllA.addr(),
            PLL::B => Register::PllB.addr(),
        }
    }

    pub fn reset_bits(&self) -> PLLResetBits {
        match *self {
            PLL::A => PLLResetBits::PLLA_RST,
            PLL::B => PLLResetBits::PLLB_RST,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
    Clk3,
    Clk4,
    Clk5,
    Clk6,
    Clk7,
}

impl ClockOutput {
    pub const ALL: [ClockOutput; 8] = [
        ClockOutput::Clk0,
        ClockOutput::Clk1,
        ClockOutput::Clk2,
        ClockOutput::Clk3,
        ClockOutput::Clk4,
        ClockOutput::Clk5,
        ClockOutput::Clk6,
        ClockOutput::Clk7,
    ];

    pub fn from_index(ix: u8) -> Option<ClockOutput> {
        ClockOutput::ALL.get(ix as usize).copied()
    }

    pub fn ix(&self) -> u8 {
        *self as u8
    }

    /// Bit of this output in the output enable register.
    pub fn enable_bit(&self) -> u8 {
        1 << self.ix()
    }

    pub fn control_addr(&self) -> u8 {
        Register::ClockControlBase.addr() + self.ix()
    }

    /// Parameter block of the fractional multisynth driving this output.
    ///
    /// CLK6 and CLK7 are fed by integer-only multisynths and have none.
    pub fn multisynth_addr(&self) -> Result<u8, Error> {
        match self.ix() {
            ix @ 0..=5 => Ok(Register::MultisynthBase.addr() + MULTISYNTH_STRIDE * ix),
            _ => Err(Error::InvalidParameter),
        }
    }

    pub fn phase_offset_addr(&self) -> Result<u8, Error> {
        match self.ix() {
            ix @ 0..=5 => Ok(Register::PhaseOffsetBase.addr() + ix),
            _ => Err(Error::InvalidParameter),
        }
    }
}

/// Additional power-of-two divider applied after the multisynth.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl OutputDivider {
    pub fn from_exp(exp: u8) -> Result<OutputDivider, Error> {
        match exp {
            0 => Ok(OutputDivider::Div1),
            1 => Ok(OutputDivider::Div2),
            2 => Ok(OutputDivider::Div4),
            3 => Ok(OutputDivider::Div8),
            4 => Ok(OutputDivider::Div16),
            5 => Ok(OutputDivider::Div32),
            6 => Ok(OutputDivider::Div64),
            7 => Ok(OutputDivider::Div128),
            _ => Err(Error::InvalidParameter),
        }
    }

    /// Exponent as stored in the `R_DIV` field.
    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn denominator(&self) -> u32 {
        1 << self.bits()
    }
}

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS_CLKIN = 0b0001_0000;
        const LOS_XTAL = 0b0000_1000;
    }
}

bitflags! {
    pub struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_MASK = 0b11_000000;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MASK = 0b0000_1100;
        const CLK_SRC_XTAL = 0b0000_0000;
        const CLK_SRC_CLKIN = 0b0000_0100;
        const CLK_SRC_MS_ALT = 0b0000_1000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    pub struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_channel_addresses() {
        assert_eq!(ClockOutput::Clk0.multisynth_addr(), Ok(42));
        assert_eq!(ClockOutput::Clk2.multisynth_addr(), Ok(58));
        assert_eq!(ClockOutput::Clk5.multisynth_addr(), Ok(82));
        assert_eq!(ClockOutput::Clk3.control_addr(), 19);
        assert_eq!(ClockOutput::Clk7.control_addr(), 23);
        assert_eq!(ClockOutput::Clk1.phase_offset_addr(), Ok(166));
        assert_eq!(ClockOutput::Clk4.enable_bit(), 0b0001_0000);
    }

    #[test]
    fn integer_only_outputs_have_no_multisynth_block() {
        assert_eq!(
            ClockOutput::Clk6.multisynth_addr(),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            ClockOutput::Clk7.phase_offset_addr(),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn pll_blocks_and_reset_bits() {
        assert_eq!(PLL::A.base_addr(), 26);
        assert_eq!(PLL::B.base_addr(), 34);
        assert_eq!(PLL::A.reset_bits().bits(), 0x20);
        assert_eq!(PLL::B.reset_bits().bits(), 0x80);
    }

    #[test]
    fn output_divider_exponents() {
        assert_eq!(OutputDivider::from_exp(3), Ok(OutputDivider::Div8));
        assert_eq!(OutputDivider::Div128.denominator(), 128);
        assert_eq!(OutputDivider::from_exp(8), Err(Error::InvalidParameter));
        assert_eq!(ClockOutput::from_index(5), Some(ClockOutput::Clk5));
        assert_eq!(ClockOutput::from_index(8), None);
    }
}
