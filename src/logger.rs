//! Per-channel verbosity gating on top of the `tracing` facade.
//!
//! Every subsystem logs to its own channel at an integer verbosity. A channel
//! set to 0 or below is silent. Verbosity 1 maps to `info`, 2 and 3 to
//! `debug`, 4 and above to `trace`, with the channel name attached as a
//! field so a subscriber can filter per subsystem.
use std::fmt::Arguments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    Engine,
    Ic3,
    Bmc,
    Minimization,
    Marco,
    Sisi,
    BruteForceMin,
    Ivc,
    IvcBf,
    IvcUcbf,
    MarcoIvc,
    Caivc,
    Cbvc,
    UnifiedIvc,
}

pub const NUM_LOG_CHANNELS: usize = 14;

impl LogChannel {
    pub fn name(self) -> &'static str {
        match self {
            LogChannel::Engine => "engine",
            LogChannel::Ic3 => "ic3",
            LogChannel::Bmc => "bmc",
            LogChannel::Minimization => "minimization",
            LogChannel::Marco => "marco",
            LogChannel::Sisi => "sisi",
            LogChannel::BruteForceMin => "bfmin",
            LogChannel::Ivc => "ivc",
            LogChannel::IvcBf => "ivc_bf",
            LogChannel::IvcUcbf => "ivc_ucbf",
            LogChannel::MarcoIvc => "marco_ivc",
            LogChannel::Caivc => "caivc",
            LogChannel::Cbvc => "cbvc",
            LogChannel::UnifiedIvc => "uivc",
        }
    }

    fn index(self) -> usize {
        match self {
            LogChannel::Engine => 0,
            LogChannel::Ic3 => 1,
            LogChannel::Bmc => 2,
            LogChannel::Minimization => 3,
            LogChannel::Marco => 4,
            LogChannel::Sisi => 5,
            LogChannel::BruteForceMin => 6,
            LogChannel::Ivc => 7,
            LogChannel::IvcBf => 8,
            LogChannel::IvcUcbf => 9,
            LogChannel::MarcoIvc => 10,
            LogChannel::Caivc => 11,
            LogChannel::Cbvc => 12,
            LogChannel::UnifiedIvc => 13,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Logger {
    verbosity: [i32; NUM_LOG_CHANNELS],
}

impl Default for Logger {
    fn default() -> Self {
        Logger {
            verbosity: [0; NUM_LOG_CHANNELS],
        }
    }
}

impl Logger {
    pub fn new() -> Self {
        Logger::default()
    }

    pub fn verbosity(&self, channel: LogChannel) -> i32 {
        self.verbosity[channel.index()]
    }

    pub fn set_verbosity(&mut self, channel: LogChannel, v: i32) {
        self.verbosity[channel.index()] = v;
    }

    pub fn set_all_verbosities(&mut self, v: i32) {
        for slot in self.verbosity.iter_mut() {
            *slot = v;
        }
    }

    pub fn enabled(&self, channel: LogChannel, v: i32) -> bool {
        v <= self.verbosity(channel)
    }

    /// Emit a message on `channel` at verbosity `v`. Silent when the channel
    /// verbosity is below `v`.
    pub fn log(&self, channel: LogChannel, v: i32, args: Arguments) {
        if !self.enabled(channel, v) {
            return;
        }
        let name = channel.name();
        match v {
            i32::MIN..=1 => tracing::info!(channel = name, "{}", args),
            2..=3 => tracing::debug!(channel = name, "{}", args),
            _ => tracing::trace!(channel = name, "{}", args),
        }
    }
}

/// `clog!(gs, Channel, verbosity, "fmt", args...)` — channel log through a
/// [`GlobalState`](crate::options::GlobalState).
#[macro_export]
macro_rules! clog {
    ($gs:expr, $channel:expr, $v:expr, $($arg:tt)*) => {
        $gs.logger.borrow().log($channel, $v, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_gating() {
        let mut logger = Logger::new();
        assert!(!logger.enabled(LogChannel::Ic3, 1));
        logger.set_verbosity(LogChannel::Ic3, 2);
        assert!(logger.enabled(LogChannel::Ic3, 1));
        assert!(logger.enabled(LogChannel::Ic3, 2));
        assert!(!logger.enabled(LogChannel::Ic3, 3));
        assert!(!logger.enabled(LogChannel::Bmc, 1));
        logger.set_all_verbosities(4);
        assert!(logger.enabled(LogChannel::Bmc, 4));
    }
}
