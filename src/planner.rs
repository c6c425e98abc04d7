/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Turns frequency requests into ordered register programming sequences.
//!
//! Nothing here touches the bus. A [`SynthesisResult`] lists the steps in
//! the order they must reach the device; the PLL reset always comes last, so a
//! sequence aborted half way leaves the previous frequency running.

use heapless::Vec;

use crate::codec::{pack, ClockControl, PackedRegisterImage};
use crate::logger::{Facility, Logger, Severity};
use crate::registers::{
    ClockControlBits, ClockOutput, OutputDivider, Register, DIVIDER_BLOCK_LEN, PLL,
};
use crate::search::{seek, seek_quadrature, Solution};
use crate::Error;

/// Longest sequence a plan produces (quadrature).
pub const MAX_STEPS: usize = 8;

/// Register pointer plus the bytes written from there on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u8,
    pub data: Vec<u8, DIVIDER_BLOCK_LEN>,
}

impl RegisterWrite {
    pub fn byte(address: u8, value: u8) -> Self {
        let mut data = Vec::new();
        // capacity is at least one
        let _ = data.push(value);
        RegisterWrite { address, data }
    }

    pub fn block(address: u8, image: &PackedRegisterImage) -> Self {
        let mut data = Vec::new();
        // the image is exactly as long as the capacity
        let _ = data.extend_from_slice(image.bytes());
        RegisterWrite { address, data }
    }
}

/// Update of the bits in `mask` of one register, keeping the others.
///
/// The transport reads the register, hands the value to [`apply`] and writes
/// the result back. Both halves belong in the same critical section.
///
/// [`apply`]: ReadModifyWrite::apply
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadModifyWrite {
    pub address: u8,
    pub mask: u8,
    pub value: u8,
}

impl ReadModifyWrite {
    pub fn apply(&self, current: u8) -> u8 {
        (current & !self.mask) | (self.value & self.mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Write(RegisterWrite),
    Modify(ReadModifyWrite),
}

/// Ordered programming sequence for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisResult {
    steps: Vec<Step, MAX_STEPS>,
    solution: Option<Solution>,
}

impl SynthesisResult {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Dividers behind the sequence, `None` for output enable changes.
    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    fn push(&mut self, step: Step) -> Result<(), Error> {
        self.steps.push(step).map_err(|_| Error::InvalidParameter)
    }

    fn write(&mut self, write: RegisterWrite) -> Result<(), Error> {
        self.push(Step::Write(write))
    }

    fn modify(&mut self, modify: ReadModifyWrite) -> Result<(), Error> {
        self.push(Step::Modify(modify))
    }
}

/// Clock control bits a frequency change owns; drive strength, clock source
/// and inversion stay as they are.
const CLOCK_CONTROL_MASK: u8 = ClockControlBits::CLK_PDN.bits()
    | ClockControlBits::MS_INT.bits()
    | ClockControlBits::MS_SRC.bits();

pub struct SynthesisPlanner<L> {
    reference_hz: u32,
    logger: L,
}

impl<L: Logger> SynthesisPlanner<L> {
    pub fn new(reference_hz: u32, logger: L) -> Self {
        SynthesisPlanner {
            reference_hz,
            logger,
        }
    }

    pub fn reference_hz(&self) -> u32 {
        self.reference_hz
    }

    /// Drives `clk` at `freq` from `pll`.
    ///
    /// Sequence: PLL parameters, multisynth parameters, clock control, reset
    /// of `pll`.
    pub fn plan_single(
        &self,
        pll: PLL,
        clk: ClockOutput,
        freq: u64,
    ) -> Result<SynthesisResult, Error> {
        let ms_addr = clk.multisynth_addr()?;
        let solution = seek(self.reference_hz, freq)?;
        self.log_solution(&solution, freq);

        let mut result = SynthesisResult::default();
        result.write(pll_write(pll, &solution)?)?;
        result.write(RegisterWrite::block(ms_addr, &multisynth_image(&solution)?))?;
        result.modify(clock_control(clk, pll, solution.multisynth.is_integer()))?;
        result.write(reset(pll))?;
        result.solution = Some(solution);

        Ok(result)
    }

    /// Drives `clk.0` (I) and `clk.1` (Q) at `freq`, Q lagging by 90°.
    ///
    /// Both outputs divide the shared PLL identically; the Q phase offset is
    /// the multisynth divisor, which the device counts in quarter VCO periods.
    pub fn plan_quadrature(
        &self,
        pll: PLL,
        clk: (ClockOutput, ClockOutput),
        freq: u64,
    ) -> Result<SynthesisResult, Error> {
        let (clk_i, clk_q) = clk;
        if clk_i == clk_q {
            return Err(Error::InvalidParameter);
        }
        let ms_addr = (clk_i.multisynth_addr()?, clk_q.multisynth_addr()?);
        let phase_addr = (clk_i.phase_offset_addr()?, clk_q.phase_offset_addr()?);

        let solution = seek_quadrature(self.reference_hz, freq)?;
        self.log_solution(&solution, freq);
        if !solution.multisynth.is_integer() {
            self.logger.log(
                Facility::Planner,
                Severity::Warn,
                format_args!(
                    "quadrature divisor {}+{}/{} is fractional, phase offset only approximates 90°",
                    solution.multisynth.whole,
                    solution.multisynth.numerator,
                    solution.multisynth.denominator
                ),
            );
        }
        let phase = solution.multisynth.whole as u8 & 0x7f;

        let ms_image = multisynth_image(&solution)?;
        let mut result = SynthesisResult::default();
        result.write(pll_write(pll, &solution)?)?;
        result.write(RegisterWrite::block(ms_addr.0, &ms_image))?;
        result.write(RegisterWrite::block(ms_addr.1, &ms_image))?;
        result.write(RegisterWrite::byte(phase_addr.0, 0))?;
        result.write(RegisterWrite::byte(phase_addr.1, phase))?;
        // exact quarter period alignment needs the fractional path active
        result.modify(clock_control(clk_i, pll, false))?;
        result.modify(clock_control(clk_q, pll, false))?;
        result.write(reset(pll))?;
        result.solution = Some(solution);

        Ok(result)
    }

    /// Clears (`enabled`) or sets the output disable bits of `outputs`.
    pub fn enable_outputs(&self, outputs: &[ClockOutput], enabled: bool) -> SynthesisResult {
        let mask = outputs
            .iter()
            .fold(0u8, |mask, clk| mask | clk.enable_bit());

        self.logger.log(
            Facility::Planner,
            Severity::Debug,
            format_args!("outputs {:#010b} enabled: {}", mask, enabled),
        );

        let mut result = SynthesisResult::default();
        // a single step always fits
        let _ = result.modify(ReadModifyWrite {
            address: Register::OutputEnable.addr(),
            mask,
            value: if enabled { 0 } else { mask },
        });
        result
    }

    fn log_solution(&self, solution: &Solution, freq: u64) {
        self.logger.log(
            Facility::Planner,
            Severity::Debug,
            format_args!(
                "{} Hz: pll {}+{}/{}, ms {}+{}/{}{}, r_div {}, vco {} Hz",
                freq,
                solution.pll.whole,
                solution.pll.numerator,
                solution.pll.denominator,
                solution.multisynth.whole,
                solution.multisynth.numerator,
                solution.multisynth.denominator,
                if solution.div_by_4 { " (div by 4)" } else { "" },
                solution.r_div.denominator(),
                solution.vco_hz(self.reference_hz),
            ),
        );
    }
}

fn pll_write(pll: PLL, solution: &Solution) -> Result<RegisterWrite, Error> {
    let image = pack(&solution.pll, false, OutputDivider::Div1)?;
    Ok(RegisterWrite::block(pll.base_addr(), &image))
}

fn multisynth_image(solution: &Solution) -> Result<PackedRegisterImage, Error> {
    pack(&solution.multisynth, solution.div_by_4, solution.r_div)
}

fn clock_control(clk: ClockOutput, pll: PLL, integer_mode: bool) -> ReadModifyWrite {
    let value = ClockControl::from_bits(0)
        .with_powered_down(false)
        .with_integer_mode(integer_mode)
        .with_pll(pll);
    ReadModifyWrite {
        address: clk.control_addr(),
        mask: CLOCK_CONTROL_MASK,
        value: value.bits(),
    }
}

fn reset(pll: PLL) -> RegisterWrite {
    RegisterWrite::byte(Register::PLLReset.addr(), pll.reset_bits().bits())
}
