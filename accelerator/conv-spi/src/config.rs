use crate::BlockLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub layout: BlockLayout,
    pub poll: PollConfig,
    /// Bus cycles to wait after each write transaction.
    pub command_gap_cycles: u32,
    /// Bus cycles to wait after StartProcessing before the first status poll.
    pub start_settle_cycles: u32,
    pub reset: ResetTiming,
}

/// Completion polling budget.
/// Must be sized for the worst-case accelerator latency of the deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Status reads before giving up
    pub max_polls: u32,
    /// Bus cycles to wait before each status read
    pub interval_cycles: u32,
}

/// Chip select guard intervals. `None` derives the interval from the bus clock period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTiming {
    /// Select-to-first-edge setup time, defaults to a quarter period.
    /// Must be shorter than half a period.
    pub settle_ns: Option<u32>,
    /// Minimum deselected time between transactions, defaults to one period
    pub idle_ns: Option<u32>,
}

/// Reset pulse on the active low accelerator reset line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetTiming {
    /// Released before the pulse
    pub pre_ns: u32,
    /// Asserted
    pub hold_ns: u32,
    /// Released before the first transaction
    pub recovery_ns: u32,
}

impl Config {
    pub const REFERENCE: Config = Config {
        layout: BlockLayout::REFERENCE,
        poll: PollConfig::REFERENCE,
        command_gap_cycles: 10,
        start_settle_cycles: 5,
        reset: ResetTiming::REFERENCE,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl PollConfig {
    pub const REFERENCE: PollConfig = PollConfig {
        max_polls: 5000,
        interval_cycles: 50,
    };
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl FrameTiming {
    pub const fn settle_ns(&self, period_ns: u32) -> u32 {
        match self.settle_ns {
            Some(ns) => ns,
            None => period_ns / 4,
        }
    }

    pub const fn idle_ns(&self, period_ns: u32) -> u32 {
        match self.idle_ns {
            Some(ns) => ns,
            None => period_ns,
        }
    }
}

impl ResetTiming {
    pub const REFERENCE: ResetTiming = ResetTiming {
        pre_ns: 20,
        hold_ns: 50,
        recovery_ns: 50,
    };
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self::REFERENCE
    }
}
