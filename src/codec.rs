/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Bit packing of the fractional divider parameters and the clock control
//! field accessors.
//!
//! Both the feedback (PLL) and the output multisynths are programmed with the
//! same three-part encoding of `a + b / c`:
//!
//! ```text
//! P1 = 128 * a + floor(128 * b / c) - 512
//! P2 = 128 * b - c * floor(128 * b / c)
//! P3 = c
//! ```

use crate::registers::{ClockControlBits, OutputDivider, DIVIDER_BLOCK_LEN, PLL};
use crate::Error;

/// Largest value of the 18-bit `P1` field.
pub const P1_MAX: u32 = 0x3_ffff;

/// Largest numerator or denominator, both stored in 20-bit fields.
pub const FRACTION_MAX: u32 = 0xf_ffff;

/// Smallest whole part the encoding can express (`P1 = 0`).
pub const WHOLE_MIN: u32 = 4;

/// Largest whole part for which `P1` still fits 18 bits with any fraction.
pub const WHOLE_MAX: u32 = 2051;

const DIV_BY_4_BITS: u8 = 0b0000_1100;
const R_DIV_SHIFT: u8 = 4;
const R_DIV_MASK: u8 = 0b0111_0000;

/// A divider `whole + numerator / denominator`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RationalDivider {
    pub whole: u32,
    pub numerator: u32,
    pub denominator: u32,
}

impl RationalDivider {
    pub const fn new(whole: u32, numerator: u32, denominator: u32) -> Self {
        RationalDivider {
            whole,
            numerator,
            denominator,
        }
    }

    pub const fn integer(whole: u32) -> Self {
        RationalDivider::new(whole, 0, 1)
    }

    pub fn is_integer(&self) -> bool {
        self.numerator == 0
    }

    /// `whole * denominator + numerator`, the divider is this over `denominator`.
    pub fn scaled(&self) -> u64 {
        u64::from(self.whole) * u64::from(self.denominator) + u64::from(self.numerator)
    }

    pub fn as_f64(&self) -> f64 {
        self.scaled() as f64 / f64::from(self.denominator)
    }

    /// Register parameters `(P1, P2, P3)`.
    pub fn params(&self) -> Result<(u32, u32, u32), Error> {
        if self.denominator == 0 || self.denominator > FRACTION_MAX {
            return Err(Error::EncodingOverflow);
        }
        if self.numerator > FRACTION_MAX {
            return Err(Error::EncodingOverflow);
        }
        if self.numerator >= self.denominator {
            return Err(Error::InvalidParameter);
        }
        if self.whole < WHOLE_MIN || self.whole > WHOLE_MAX {
            return Err(Error::EncodingOverflow);
        }

        let ratio = ((128u64 * u64::from(self.numerator)) / u64::from(self.denominator)) as u32;

        let p1 = 128 * self.whole + ratio - 512;
        let p2 = 128 * self.numerator - self.denominator * ratio;
        let p3 = self.denominator;

        if p1 > P1_MAX {
            return Err(Error::EncodingOverflow);
        }

        Ok((p1, p2, p3))
    }

    /// Inverse of [`RationalDivider::params`].
    pub fn from_params(p1: u32, p2: u32, p3: u32) -> Result<Self, Error> {
        if p3 == 0 || p3 > FRACTION_MAX || p1 > P1_MAX || p2 >= p3 {
            return Err(Error::InvalidParameter);
        }

        let shifted = p1 + 512;
        let whole = shifted >> 7;
        let ratio = shifted & 0x7f;
        let numerator = (p2 + p3 * ratio) / 128;

        Ok(RationalDivider::new(whole, numerator, p3))
    }
}

/// The eight parameter bytes of one divider, in register order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PackedRegisterImage(pub [u8; DIVIDER_BLOCK_LEN]);

impl PackedRegisterImage {
    pub fn bytes(&self) -> &[u8; DIVIDER_BLOCK_LEN] {
        &self.0
    }

    pub fn p1(&self) -> u32 {
        let b = &self.0;
        (u32::from(b[2] & 0b11) << 16) | (u32::from(b[3]) << 8) | u32::from(b[4])
    }

    pub fn p2(&self) -> u32 {
        let b = &self.0;
        (u32::from(b[5] & 0x0f) << 16) | (u32::from(b[6]) << 8) | u32::from(b[7])
    }

    pub fn p3(&self) -> u32 {
        let b = &self.0;
        (u32::from(b[5] & 0xf0) << 12) | (u32::from(b[0]) << 8) | u32::from(b[1])
    }

    pub fn div_by_4(&self) -> bool {
        self.0[2] & DIV_BY_4_BITS == DIV_BY_4_BITS
    }

    pub fn r_div(&self) -> OutputDivider {
        match OutputDivider::from_exp((self.0[2] & R_DIV_MASK) >> R_DIV_SHIFT) {
            Ok(r_div) => r_div,
            // three bits always hold a valid exponent
            Err(_) => OutputDivider::Div1,
        }
    }

    /// Register pointer followed by the eight parameter bytes.
    pub fn framed(&self, addr: u8) -> [u8; DIVIDER_BLOCK_LEN + 1] {
        let mut frame = [0u8; DIVIDER_BLOCK_LEN + 1];
        frame[0] = addr;
        frame[1..].copy_from_slice(&self.0);
        frame
    }
}

pub fn pack(
    divider: &RationalDivider,
    div_by_4: bool,
    r_div: OutputDivider,
) -> Result<PackedRegisterImage, Error> {
    let (p1, p2, p3) = divider.params()?;

    let flags = (r_div.bits() << R_DIV_SHIFT) | if div_by_4 { DIV_BY_4_BITS } else { 0 };

    Ok(PackedRegisterImage([
        ((p3 & 0x0000_ff00) >> 8) as u8,
        p3 as u8,
        ((p1 & 0x0003_0000) >> 16) as u8 | flags,
        ((p1 & 0x0000_ff00) >> 8) as u8,
        p1 as u8,
        (((p3 & 0x000f_0000) >> 12) | ((p2 & 0x000f_0000) >> 16)) as u8,
        ((p2 & 0x0000_ff00) >> 8) as u8,
        p2 as u8,
    ]))
}

pub fn unpack(image: &PackedRegisterImage) -> Result<RationalDivider, Error> {
    RationalDivider::from_params(image.p1(), image.p2(), image.p3())
}

/// Output drive strength.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriveStrength {
    _2mA,
    _4mA,
    _6mA,
    _8mA,
}

impl DriveStrength {
    fn bits(&self) -> ClockControlBits {
        match *self {
            DriveStrength::_2mA => ClockControlBits::CLK_DRV_2,
            DriveStrength::_4mA => ClockControlBits::CLK_DRV_4,
            DriveStrength::_6mA => ClockControlBits::CLK_DRV_6,
            DriveStrength::_8mA => ClockControlBits::CLK_DRV_8,
        }
    }
}

/// What the output stage of a channel is connected to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockSource {
    Xtal,
    ClkIn,
    /// The multisynth of CLK0 (for CLK0..3) or CLK4 (for CLK4..7).
    MultisynthAlt,
    Multisynth,
}

impl ClockSource {
    fn bits(&self) -> ClockControlBits {
        match *self {
            ClockSource::Xtal => ClockControlBits::CLK_SRC_XTAL,
            ClockSource::ClkIn => ClockControlBits::CLK_SRC_CLKIN,
            ClockSource::MultisynthAlt => ClockControlBits::CLK_SRC_MS_ALT,
            ClockSource::Multisynth => ClockControlBits::CLK_SRC_MS,
        }
    }
}

/// Contents of one clock control register (16..23).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockControl(ClockControlBits);

impl ClockControl {
    pub fn from_bits(bits: u8) -> Self {
        ClockControl(ClockControlBits::from_bits_truncate(bits))
    }

    /// Powered down output fed from its own multisynth, as left by `init`.
    pub fn powered_down(drive: DriveStrength) -> Self {
        ClockControl(ClockControlBits::CLK_PDN)
            .with_source(ClockSource::Multisynth)
            .with_drive_strength(drive)
    }

    pub fn bits(&self) -> u8 {
        self.0.bits()
    }

    pub fn drive_strength(&self) -> DriveStrength {
        match self.0 & ClockControlBits::CLK_DRV_MASK {
            ClockControlBits::CLK_DRV_2 => DriveStrength::_2mA,
            ClockControlBits::CLK_DRV_4 => DriveStrength::_4mA,
            ClockControlBits::CLK_DRV_6 => DriveStrength::_6mA,
            _ => DriveStrength::_8mA,
        }
    }

    pub fn with_drive_strength(self, drive: DriveStrength) -> Self {
        ClockControl((self.0 - ClockControlBits::CLK_DRV_MASK) | drive.bits())
    }

    pub fn source(&self) -> ClockSource {
        match self.0 & ClockControlBits::CLK_SRC_MASK {
            ClockControlBits::CLK_SRC_XTAL => ClockSource::Xtal,
            ClockControlBits::CLK_SRC_CLKIN => ClockSource::ClkIn,
            ClockControlBits::CLK_SRC_MS_ALT => ClockSource::MultisynthAlt,
            _ => ClockSource::Multisynth,
        }
    }

    pub fn with_source(self, source: ClockSource) -> Self {
        ClockControl((self.0 - ClockControlBits::CLK_SRC_MASK) | source.bits())
    }

    pub fn inverted(&self) -> bool {
        self.0.contains(ClockControlBits::CLK_INV)
    }

    pub fn with_inverted(self, inverted: bool) -> Self {
        self.with(ClockControlBits::CLK_INV, inverted)
    }

    /// PLL feeding the multisynth of this output.
    pub fn pll(&self) -> PLL {
        if self.0.contains(ClockControlBits::MS_SRC) {
            PLL::B
        } else {
            PLL::A
        }
    }

    pub fn with_pll(self, pll: PLL) -> Self {
        self.with(ClockControlBits::MS_SRC, pll == PLL::B)
    }

    pub fn integer_mode(&self) -> bool {
        self.0.contains(ClockControlBits::MS_INT)
    }

    pub fn with_integer_mode(self, integer: bool) -> Self {
        self.with(ClockControlBits::MS_INT, integer)
    }

    pub fn is_powered_down(&self) -> bool {
        self.0.contains(ClockControlBits::CLK_PDN)
    }

    pub fn with_powered_down(self, powered_down: bool) -> Self {
        self.with(ClockControlBits::CLK_PDN, powered_down)
    }

    fn with(mut self, bits: ClockControlBits, value: bool) -> Self {
        self.0.set(bits, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_the_datasheet_formula() {
        assert_eq!(RationalDivider::new(24, 147, 625).params(), Ok((2590, 66, 625)));
        assert_eq!(RationalDivider::integer(12).params(), Ok((1024, 0, 1)));
        assert_eq!(RationalDivider::integer(4).params(), Ok((0, 0, 1)));
    }

    #[test]
    fn integer_divider_keeps_its_denominator() {
        let divider = RationalDivider::new(36, 0, 625);
        let image = pack(&divider, false, OutputDivider::Div1).unwrap();
        assert_eq!(image.p3(), 625);
        assert_eq!(unpack(&image), Ok(divider));
    }

    #[test]
    fn round_trip_across_field_widths() {
        let dividers = [
            RationalDivider::new(WHOLE_MIN, 0, 1),
            RationalDivider::new(15, 1, 2),
            RationalDivider::new(35, 147059, 500000),
            RationalDivider::new(90, FRACTION_MAX - 1, FRACTION_MAX),
            RationalDivider::new(1563, 0, 1),
            RationalDivider::new(2047, 0xabcde, 0xfedcb),
            RationalDivider::new(WHOLE_MAX, 1, 0x10000),
        ];
        for divider in dividers.iter() {
            let image = pack(divider, false, OutputDivider::Div32).unwrap();
            assert_eq!(unpack(&image).as_ref(), Ok(divider), "{:?}", image);
            assert_eq!(image.r_div(), OutputDivider::Div32);
        }
    }

    #[test]
    fn largest_divider_fills_every_field() {
        let divider = RationalDivider::new(WHOLE_MAX, FRACTION_MAX - 1, FRACTION_MAX);
        let image = pack(&divider, true, OutputDivider::Div128).unwrap();
        assert_eq!(image.p1(), P1_MAX);
        assert_eq!(image.p3(), FRACTION_MAX);
        assert!(image.p2() < FRACTION_MAX);
        assert!(image.div_by_4());
        assert_eq!(image.r_div(), OutputDivider::Div128);
        assert_eq!(unpack(&image), Ok(divider));
    }

    #[test]
    fn byte_layout() {
        let image = pack(&RationalDivider::new(24, 147, 625), false, OutputDivider::Div1).unwrap();
        // P1 = 2590 = 0x00a1e, P2 = 66, P3 = 625 = 0x271
        assert_eq!(image.bytes(), &[0x02, 0x71, 0x00, 0x0a, 0x1e, 0x00, 0x00, 0x42]);

        let image = pack(&RationalDivider::integer(1563), false, OutputDivider::Div8).unwrap();
        // P1 = 199552 = 0x30b80
        assert_eq!(image.bytes(), &[0x00, 0x01, 0x33, 0x0b, 0x80, 0x00, 0x00, 0x00]);

        let image = pack(&RationalDivider::integer(4), true, OutputDivider::Div1).unwrap();
        assert_eq!(image.bytes(), &[0x00, 0x01, 0x0c, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let image = pack(&RationalDivider::new(8, 0x12345, 0xabcde), false, OutputDivider::Div1)
            .unwrap();
        assert_eq!(image.bytes()[5] & 0xf0, 0xa0);
        assert_eq!(image.p3(), 0xabcde);
    }

    #[test]
    fn framed_image_leads_with_the_address() {
        let image = pack(&RationalDivider::integer(12), false, OutputDivider::Div1).unwrap();
        let frame = image.framed(50);
        assert_eq!(frame[0], 50);
        assert_eq!(&frame[1..], image.bytes());
    }

    #[test]
    fn overflowing_fields_are_rejected() {
        let overflow = Err(Error::EncodingOverflow);
        assert_eq!(pack(&RationalDivider::new(WHOLE_MAX + 1, 0, 1), false, OutputDivider::Div1), overflow);
        assert_eq!(pack(&RationalDivider::new(3, 0, 1), false, OutputDivider::Div1), overflow);
        assert_eq!(pack(&RationalDivider::new(20, 1, FRACTION_MAX + 1), false, OutputDivider::Div1), overflow);
        assert_eq!(pack(&RationalDivider::new(20, 0, 0), false, OutputDivider::Div1), overflow);
        assert_eq!(
            pack(&RationalDivider::new(20, 5, 5), false, OutputDivider::Div1),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn clock_control_fields() {
        let control = ClockControl::powered_down(DriveStrength::_6mA);
        assert_eq!(control.bits(), 0b1000_1110);
        assert!(control.is_powered_down());
        assert_eq!(control.source(), ClockSource::Multisynth);
        assert_eq!(control.drive_strength(), DriveStrength::_6mA);

        let control = control
            .with_powered_down(false)
            .with_integer_mode(true)
            .with_pll(PLL::B)
            .with_inverted(true)
            .with_source(ClockSource::ClkIn)
            .with_drive_strength(DriveStrength::_2mA);
        assert_eq!(control.bits(), 0b0111_0100);
        assert_eq!(control.pll(), PLL::B);
        assert!(control.integer_mode());
        assert!(control.inverted());
        assert_eq!(control.source(), ClockSource::ClkIn);
        assert_eq!(control.drive_strength(), DriveStrength::_2mA);
    }
}
