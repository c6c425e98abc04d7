/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Driver executing register plans over an `embedded-hal` I²C bus.

use heapless::Vec;

use crate::codec::ClockControl;
use crate::config::Config;
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::logger::{Facility, Logger, NoopLogger, Severity};
use crate::planner::{ReadModifyWrite, RegisterWrite, Step, SynthesisPlanner, SynthesisResult};
use crate::registers::{ClockOutput, DeviceStatusBits, Register, DIVIDER_BLOCK_LEN, PLL};
use crate::search::Solution;
use crate::status::StatusFlags;
use crate::Error;

fn i2c_error<E>(_: E) -> Error {
    Error::TransportFailure
}

/// Si5351 driver
pub struct Si5351Device<I2C, L = NoopLogger> {
    i2c: I2C,
    address: u8,
    config: Config,
    logger: L,
}

pub trait Si5351 {
    /// Waits for the device to finish its power-up calibration, then
    /// disables and powers down every output and sets the crystal load.
    fn init(&mut self) -> Result<(), Error>;
    fn read_device_status(&mut self) -> Result<StatusFlags, Error>;

    fn set_frequency(&mut self, pll: PLL, clk: ClockOutput, freq: u64) -> Result<Solution, Error>;
    /// Drives `clk.1` 90° behind `clk.0`.
    fn set_quadrature_frequency(
        &mut self,
        pll: PLL,
        clk: (ClockOutput, ClockOutput),
        freq: u64,
    ) -> Result<Solution, Error>;
    fn set_outputs_enabled(&mut self, outputs: &[ClockOutput], enabled: bool) -> Result<(), Error>;
    fn set_clock_enabled(&mut self, clk: ClockOutput, enabled: bool) -> Result<(), Error> {
        self.set_outputs_enabled(&[clk], enabled)
    }

    /// Executes the steps of `plan` in order, stopping at the first failure.
    fn apply(&mut self, plan: &SynthesisResult) -> Result<(), Error>;
}

impl<I2C, E> Si5351Device<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral
    pub fn new(i2c: I2C, config: Config) -> Self {
        Si5351Device::with_logger(i2c, config, NoopLogger)
    }

    pub fn new_adafruit_module(i2c: I2C) -> Self {
        Si5351Device::new(i2c, Config::adafruit_module())
    }
}

impl<I2C, E, L> Si5351Device<I2C, L>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    L: Logger,
{
    pub fn with_logger(i2c: I2C, config: Config, logger: L) -> Self {
        Si5351Device {
            i2c,
            address: config.i2c_address(),
            config,
            logger,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Plans without touching the bus.
    pub fn planner(&self) -> SynthesisPlanner<&L> {
        SynthesisPlanner::new(self.config.reference_hz, &self.logger)
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[addr], &mut buffer)
            .map_err(i2c_error)?;
        Ok(buffer[0])
    }

    fn write_register(&mut self, addr: u8, byte: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[addr, byte])
            .map_err(i2c_error)
    }

    fn write_block(&mut self, write: &RegisterWrite) -> Result<(), Error> {
        let mut frame: Vec<u8, { DIVIDER_BLOCK_LEN + 1 }> = Vec::new();
        frame.push(write.address).map_err(|_| Error::InvalidParameter)?;
        frame
            .extend_from_slice(&write.data)
            .map_err(|_| Error::InvalidParameter)?;
        self.i2c.write(self.address, &frame).map_err(i2c_error)
    }

    fn modify_register(&mut self, modify: &ReadModifyWrite) -> Result<(), Error> {
        let current = self.read_register(modify.address)?;
        self.write_register(modify.address, modify.apply(current))
    }

    fn log(&self, severity: Severity, message: core::fmt::Arguments<'_>) {
        self.logger.log(Facility::Device, severity, message);
    }
}

impl<I2C, E, L> Si5351 for Si5351Device<I2C, L>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    L: Logger,
{
    fn init(&mut self) -> Result<(), Error> {
        let mut ready = false;
        for _ in 0..self.config.init_poll_limit.max(1) {
            let status = self.read_register(Register::DeviceStatus.addr())?;
            if !DeviceStatusBits::from_bits_truncate(status).contains(DeviceStatusBits::SYS_INIT) {
                ready = true;
                break;
            }
        }
        if !ready {
            self.log(
                Severity::Error,
                format_args!(
                    "still initializing after {} status reads",
                    self.config.init_poll_limit
                ),
            );
            return Err(Error::NotReady);
        }

        self.write_register(Register::OutputEnable.addr(), 0xff)?;
        let control = ClockControl::powered_down(self.config.drive_strength).bits();
        for clk in ClockOutput::ALL.iter() {
            self.write_register(clk.control_addr(), control)?;
        }
        let load = self.config.crystal_load.bits().bits();
        self.write_register(Register::CrystalLoad.addr(), load)?;

        self.log(
            Severity::Info,
            format_args!(
                "initialized at {:#04x}, reference {} Hz",
                self.address, self.config.reference_hz
            ),
        );
        Ok(())
    }

    fn read_device_status(&mut self) -> Result<StatusFlags, Error> {
        let status = self.read_register(Register::DeviceStatus.addr())?;
        Ok(StatusFlags::decode(status))
    }

    fn set_frequency(&mut self, pll: PLL, clk: ClockOutput, freq: u64) -> Result<Solution, Error> {
        let plan = self.planner().plan_single(pll, clk, freq)?;
        self.apply(&plan)?;
        plan.solution().copied().ok_or(Error::InvalidParameter)
    }

    fn set_quadrature_frequency(
        &mut self,
        pll: PLL,
        clk: (ClockOutput, ClockOutput),
        freq: u64,
    ) -> Result<Solution, Error> {
        let plan = self.planner().plan_quadrature(pll, clk, freq)?;
        self.apply(&plan)?;
        plan.solution().copied().ok_or(Error::InvalidParameter)
    }

    fn set_outputs_enabled(&mut self, outputs: &[ClockOutput], enabled: bool) -> Result<(), Error> {
        let plan = self.planner().enable_outputs(outputs, enabled);
        self.apply(&plan)
    }

    fn apply(&mut self, plan: &SynthesisResult) -> Result<(), Error> {
        self.log(
            Severity::Debug,
            format_args!("applying {} steps", plan.steps().len()),
        );
        for step in plan.steps() {
            match step {
                Step::Write(write) => self.write_block(write)?,
                Step::Modify(modify) => self.modify_register(modify)?,
            }
        }
        Ok(())
    }
}
