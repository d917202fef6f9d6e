use core::{fmt, time::Duration};

/// Phase boundaries of a session, in protocol order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    SessionStart,
    /// Weights, patch and biases written
    LoadComplete,
    /// StartProcessing sent
    StartIssued,
    /// Done bit observed
    DoneObserved,
    /// Result block read
    ResultsRead,
}

const PHASES: usize = 5;

impl Phase {
    pub const ALL: [Phase; PHASES] = [
        Phase::SessionStart,
        Phase::LoadComplete,
        Phase::StartIssued,
        Phase::DoneObserved,
        Phase::ResultsRead,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Passive recorder of phase timestamps, in nanoseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct BenchmarkRecorder {
    stamps: [Option<u64>; PHASES],
}

impl BenchmarkRecorder {
    pub const fn new() -> Self {
        Self {
            stamps: [None; PHASES],
        }
    }

    /// Record the timestamp of `phase`. Each phase is captured once, later calls are ignored.
    pub fn record(&mut self, phase: Phase, now_ns: u64) {
        let stamp = &mut self.stamps[phase.index()];
        if stamp.is_some() {
            warn!("Phase {:?} already recorded", phase);
            return;
        }
        *stamp = Some(now_ns);
    }

    pub const fn finish(self) -> BenchmarkTrace {
        BenchmarkTrace {
            stamps: self.stamps,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Throughput {
    /// Sessions per second
    PerSecond(f64),
    /// The total time is zero or unknown
    NotComputable,
}

/// The captured timestamps of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchmarkTrace {
    stamps: [Option<u64>; PHASES],
}

impl BenchmarkTrace {
    pub const fn timestamp(&self, phase: Phase) -> Option<u64> {
        self.stamps[phase.index()]
    }

    /// All phases are recorded, strictly increasing in protocol order.
    pub fn is_monotonic(&self) -> bool {
        let mut previous = None;
        for phase in Phase::ALL {
            let Some(stamp) = self.timestamp(phase) else {
                return false;
            };
            if previous.is_some_and(|previous| stamp <= previous) {
                return false;
            }
            previous = Some(stamp);
        }
        true
    }

    /// From session start until the results are read.
    pub fn total_time(&self) -> Option<Duration> {
        self.between(Phase::SessionStart, Phase::ResultsRead)
    }

    /// From StartProcessing until done is observed.
    pub fn core_latency(&self) -> Option<Duration> {
        self.between(Phase::StartIssued, Phase::DoneObserved)
    }

    /// From session start until the operands are written.
    pub fn load_time(&self) -> Option<Duration> {
        self.between(Phase::SessionStart, Phase::LoadComplete)
    }

    /// From done until the results are read.
    pub fn readout_time(&self) -> Option<Duration> {
        self.between(Phase::DoneObserved, Phase::ResultsRead)
    }

    pub fn throughput(&self) -> Throughput {
        match self.total_time() {
            Some(total) if !total.is_zero() => Throughput::PerSecond(1.0 / total.as_secs_f64()),
            _ => Throughput::NotComputable,
        }
    }

    fn between(&self, from: Phase, to: Phase) -> Option<Duration> {
        let from = self.timestamp(from)?;
        let to = self.timestamp(to)?;
        to.checked_sub(from).map(Duration::from_nanos)
    }
}

struct Micros(Option<Duration>);

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(duration) => write!(
                f,
                "{:.2} us ({} ns)",
                duration.as_secs_f64() * 1e6,
                duration.as_nanos()
            ),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for BenchmarkTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total time: {}", Micros(self.total_time()))?;
        writeln!(f, "Load time: {}", Micros(self.load_time()))?;
        writeln!(f, "Core latency: {}", Micros(self.core_latency()))?;
        writeln!(f, "Readout time: {}", Micros(self.readout_time()))?;
        match self.throughput() {
            Throughput::PerSecond(rate) => write!(f, "Throughput: {:.2} patches/s", rate),
            Throughput::NotComputable => write!(f, "Throughput: not computable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(stamps: [u64; PHASES]) -> BenchmarkTrace {
        let mut recorder = BenchmarkRecorder::new();
        for (phase, stamp) in Phase::ALL.into_iter().zip(stamps) {
            recorder.record(phase, stamp);
        }
        recorder.finish()
    }

    #[test]
    fn derives_durations() {
        let trace = trace([0, 1_000, 1_200, 4_200, 5_000]);

        assert!(trace.is_monotonic());
        assert_eq!(Some(Duration::from_nanos(5_000)), trace.total_time());
        assert_eq!(Some(Duration::from_nanos(3_000)), trace.core_latency());
        assert_eq!(Some(Duration::from_nanos(1_000)), trace.load_time());
        assert_eq!(Some(Duration::from_nanos(800)), trace.readout_time());
        let Throughput::PerSecond(rate) = trace.throughput() else {
            panic!("throughput should be computable");
        };
        assert!((rate - 200_000.0).abs() < 1e-3);
    }

    #[test]
    fn zero_total_time_is_not_computable() {
        let trace = trace([7, 7, 7, 7, 7]);

        assert!(!trace.is_monotonic());
        assert_eq!(Some(Duration::ZERO), trace.total_time());
        assert_eq!(Throughput::NotComputable, trace.throughput());
    }

    #[test]
    fn missing_phases_are_unknown() {
        let mut recorder = BenchmarkRecorder::new();
        recorder.record(Phase::StartIssued, 100);
        recorder.record(Phase::DoneObserved, 350);
        let trace = recorder.finish();

        assert!(!trace.is_monotonic());
        assert_eq!(Some(Duration::from_nanos(250)), trace.core_latency());
        assert_eq!(None, trace.total_time());
        assert_eq!(Throughput::NotComputable, trace.throughput());
    }

    #[test]
    fn phases_are_captured_once() {
        let mut recorder = BenchmarkRecorder::new();
        recorder.record(Phase::SessionStart, 10);
        recorder.record(Phase::SessionStart, 20);

        assert_eq!(Some(10), recorder.finish().timestamp(Phase::SessionStart));
    }

    #[test]
    fn out_of_order_stamps_have_no_duration() {
        let trace = trace([500, 100, 200, 300, 400]);

        assert!(!trace.is_monotonic());
        assert_eq!(None, trace.load_time());
        assert_eq!(None, trace.total_time());
    }

    #[test]
    fn summary() {
        let summary = trace([0, 1_000, 1_200, 4_200, 5_000]).to_string();

        assert!(summary.contains("Total time: 5.00 us (5000 ns)"));
        assert!(summary.contains("Core latency: 3.00 us (3000 ns)"));
        assert!(summary.contains("Throughput: 200000.00 patches/s"));
    }
}
