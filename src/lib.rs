/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
Divider search, register planning and a platform agnostic driver for the
[Si5351], based on the [`embedded-hal`] traits.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator. A PLL
multiplies the reference up to a 600–900 MHz VCO, a per-output multisynth
divides it back down, both with fractional ratios.

The device has an I²C interface.

## Planning

[`search::seek`] finds the dividers for an output frequency and
[`SynthesisPlanner`] turns them into the register writes that program an
output, without touching the bus:

```
use si5351_synth::{ClockOutput, NoopLogger, SynthesisPlanner, PLL};

let planner = SynthesisPlanner::new(25_000_000, NoopLogger);
let plan = planner.plan_single(PLL::A, ClockOutput::Clk0, 14_175_000).unwrap();
assert_eq!(plan.steps().len(), 4);
```

## Usage

Initialize I²C bus (differs between `embedded_hal` implementations), then
instantiate the device:

```ignore
use si5351_synth::{Config, Si5351, Si5351Device};

let mut clock = Si5351Device::new(i2c, Config::default().with_reference_hz(27_000_000));
clock.init()?;
```

Or, if you have an [Adafruit module], you can use a shortcut function:

```ignore
let mut clock = Si5351Device::new_adafruit_module(i2c);
clock.init()?;
```

And set frequency on one of the outputs, or on a pair 90° apart:

```ignore
use si5351_synth::{ClockOutput, PLL};

clock.set_frequency(PLL::A, ClockOutput::Clk0, 14_175_000)?;
clock.set_quadrature_frequency(PLL::B, (ClockOutput::Clk1, ClockOutput::Clk2), 7_074_000)?;
clock.set_outputs_enabled(&[ClockOutput::Clk0, ClockOutput::Clk1, ClockOutput::Clk2], true)?;
```

Diagnostics go through an injected [`Logger`]; [`LogFacade`] forwards them
to the `log` crate.

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/japaric/embedded-hal
[Adafruit module]: https://www.adafruit.com/product/2045
*/
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use core::fmt;

pub mod codec;
pub mod config;
pub mod device;
pub mod logger;
pub mod planner;
pub mod registers;
pub mod search;
pub mod status;

pub use crate::codec::{
    pack, unpack, ClockControl, ClockSource, DriveStrength, PackedRegisterImage, RationalDivider,
};
pub use crate::config::{Config, CrystalLoad};
pub use crate::device::{Si5351, Si5351Device};
pub use crate::logger::{Facility, LogFacade, Logger, NoopLogger, Severity, SeverityFilter};
pub use crate::planner::{ReadModifyWrite, RegisterWrite, Step, SynthesisPlanner, SynthesisResult};
pub use crate::registers::{ClockOutput, OutputDivider, PLL};
pub use crate::search::Solution;
pub use crate::status::StatusFlags;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bus reported a failure; the plan was aborted at that step.
    TransportFailure,
    InvalidParameter,
    /// A divider does not fit its register fields.
    EncodingOverflow,
    UnreachableFrequency,
    /// The device kept reporting `SYS_INIT`.
    NotReady,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Error::TransportFailure => "I2C transfer failed",
            Error::InvalidParameter => "invalid parameter",
            Error::EncodingOverflow => "divider does not fit its register fields",
            Error::UnreachableFrequency => "frequency cannot be synthesized",
            Error::NotReady => "device did not finish initialization",
        })
    }
}
