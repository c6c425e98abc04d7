/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Diagnostic logging handed to the planner and the device.

use core::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Facility {
    Planner,
    Device,
}

impl Facility {
    pub fn name(&self) -> &'static str {
        match *self {
            Facility::Planner => "si5351::planner",
            Facility::Device => "si5351::device",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Severity> for log::Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => log::Level::Trace,
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

pub trait Logger {
    fn log(&self, facility: Facility, severity: Severity, message: fmt::Arguments<'_>);
}

impl<'a, L: Logger + ?Sized> Logger for &'a L {
    fn log(&self, facility: Facility, severity: Severity, message: fmt::Arguments<'_>) {
        (**self).log(facility, severity, message)
    }
}

/// Discards everything.
#[derive(Debug, Copy, Clone, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _: Facility, _: Severity, _: fmt::Arguments<'_>) {}
}

/// Forwards to the `log` crate, using the facility name as the target.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogFacade;

impl Logger for LogFacade {
    fn log(&self, facility: Facility, severity: Severity, message: fmt::Arguments<'_>) {
        let level: log::Level = severity.into();
        log::log!(target: facility.name(), level, "{}", message);
    }
}

/// Drops messages below `min` before they reach `inner`.
#[derive(Debug, Copy, Clone)]
pub struct SeverityFilter<L> {
    inner: L,
    min: Severity,
}

impl<L: Logger> SeverityFilter<L> {
    pub fn new(inner: L, min: Severity) -> Self {
        SeverityFilter { inner, min }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: Logger> Logger for SeverityFilter<L> {
    fn log(&self, facility: Facility, severity: Severity, message: fmt::Arguments<'_>) {
        if severity >= self.min {
            self.inner.log(facility, severity, message);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::string::{String, ToString};
    use std::vec::Vec;

    /// Keeps every message for inspection.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) entries: RefCell<Vec<(Facility, Severity, String)>>,
    }

    impl Logger for Recorder {
        fn log(&self, facility: Facility, severity: Severity, message: fmt::Arguments<'_>) {
            self.entries
                .borrow_mut()
                .push((facility, severity, message.to_string()));
        }
    }

    #[test]
    fn filter_drops_low_severities() {
        let recorder = Recorder::default();
        let filter = SeverityFilter::new(&recorder, Severity::Warn);
        filter.log(Facility::Planner, Severity::Debug, format_args!("quiet"));
        filter.log(Facility::Device, Severity::Error, format_args!("loud {}", 1));
        filter.log(Facility::Planner, Severity::Warn, format_args!("edge"));

        let entries = recorder.entries.borrow();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (Facility::Device, Severity::Error, "loud 1".to_string()));
        assert_eq!(entries[1].2, "edge");
    }

    #[test]
    fn facility_targets() {
        assert_eq!(Facility::Planner.name(), "si5351::planner");
        assert_eq!(log::Level::from(Severity::Warn), log::Level::Warn);
        LogFacade.log(Facility::Device, Severity::Info, format_args!("no logger installed"));
    }
}
