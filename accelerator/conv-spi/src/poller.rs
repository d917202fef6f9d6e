use embedded_hal::digital::{InputPin, OutputPin};

use crate::{traits::BusClock, Driver, DriverError, PollConfig, StatusByte};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Done was observed at status read number `polls`.
    Done { polls: u32, status: StatusByte },
    /// `polls` status reads without done.
    TimedOut { polls: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Polling { polls: u32 },
    Finished(PollOutcome),
}

impl PollState {
    /// Status reads so far.
    pub const fn polls(&self) -> u32 {
        match *self {
            PollState::Polling { polls }
            | PollState::Finished(PollOutcome::Done { polls, .. })
            | PollState::Finished(PollOutcome::TimedOut { polls }) => polls,
        }
    }
}

/// Completion polling state for one start/wait cycle.
///
/// Only the done bit ends polling. Busy with done clear is the same as idle: not yet.
pub struct PollSession {
    max_polls: u32,
    state: PollState,
}

impl PollSession {
    pub const fn new(config: PollConfig) -> Self {
        let state = if config.max_polls == 0 {
            PollState::Finished(PollOutcome::TimedOut { polls: 0 })
        } else {
            PollState::Polling { polls: 0 }
        };

        Self {
            max_polls: config.max_polls,
            state,
        }
    }

    pub const fn state(&self) -> PollState {
        self.state
    }

    pub const fn outcome(&self) -> Option<PollOutcome> {
        match self.state {
            PollState::Finished(outcome) => Some(outcome),
            PollState::Polling { .. } => None,
        }
    }

    /// Account for one status read. Has no effect once finished.
    pub fn observe(&mut self, status: StatusByte) -> PollState {
        if let PollState::Polling { polls } = self.state {
            let polls = polls + 1;
            self.state = if status.done() {
                PollState::Finished(PollOutcome::Done { polls, status })
            } else if polls >= self.max_polls {
                PollState::Finished(PollOutcome::TimedOut { polls })
            } else {
                PollState::Polling { polls }
            };
        }

        self.state
    }
}

impl PollOutcome {
    /// The number of polls until done, or a timeout error.
    pub fn into_result(self) -> Result<u32, DriverError> {
        match self {
            PollOutcome::Done { polls, .. } => Ok(polls),
            PollOutcome::TimedOut { polls } => Err(DriverError::Timeout { polls }),
        }
    }
}

impl<Clock, Mosi, Miso, Cs> Driver<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    /// Poll the status byte until the accelerator reports done or the poll budget is spent.
    pub async fn wait_done(&mut self) -> Result<PollOutcome, DriverError> {
        let config = self.config.poll;
        let mut session = PollSession::new(config);

        loop {
            if let Some(outcome) = session.outcome() {
                match outcome {
                    PollOutcome::Done { polls, .. } => info!("Done after {} polls", polls),
                    PollOutcome::TimedOut { polls } => error!("No done after {} polls", polls),
                }
                return Ok(outcome);
            }

            self.link.wait_cycles(config.interval_cycles).await?;
            let status = self.read_status().await?;
            let state = session.observe(status);
            trace!(
                "Poll {}/{}: status 0x{:02x} (done {}, busy {})",
                state.polls(),
                config.max_polls,
                status.0,
                status.done(),
                status.busy()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        sim::{SimBus, SimDriver, SimulatedAccelerator},
        Command, Config, FrameTiming,
    };

    use super::*;

    const BUSY: StatusByte = StatusByte(0x01);
    const DONE: StatusByte = StatusByte(0x02);

    #[test]
    fn done_ends_polling() {
        let mut session = PollSession::new(PollConfig {
            max_polls: 10,
            interval_cycles: 0,
        });

        assert_eq!(PollState::Polling { polls: 1 }, session.observe(BUSY));
        assert_eq!(PollState::Polling { polls: 2 }, session.observe(StatusByte::IDLE));
        assert_eq!(
            PollState::Finished(PollOutcome::Done {
                polls: 3,
                status: DONE
            }),
            session.observe(DONE)
        );
    }

    #[test]
    fn busy_with_done_is_done() {
        let mut session = PollSession::new(PollConfig::default());

        let state = session.observe(StatusByte(0x03));

        assert!(matches!(
            state,
            PollState::Finished(PollOutcome::Done { polls: 1, .. })
        ));
    }

    #[test]
    fn budget_ends_polling() {
        let mut session = PollSession::new(PollConfig {
            max_polls: 3,
            interval_cycles: 0,
        });

        session.observe(BUSY);
        session.observe(BUSY);
        assert_eq!(
            PollState::Finished(PollOutcome::TimedOut { polls: 3 }),
            session.observe(BUSY)
        );

        // A late done does not change the outcome.
        session.observe(DONE);
        assert_eq!(
            Some(PollOutcome::TimedOut { polls: 3 }),
            session.outcome()
        );
    }

    #[test]
    fn zero_budget_times_out_immediately() {
        let session = PollSession::new(PollConfig {
            max_polls: 0,
            interval_cycles: 0,
        });

        assert_eq!(Some(PollOutcome::TimedOut { polls: 0 }), session.outcome());
    }

    #[test]
    fn timeout_is_an_error() {
        assert_eq!(Ok(3), PollOutcome::Done { polls: 3, status: DONE }.into_result());
        assert_eq!(
            Err(DriverError::Timeout { polls: 7 }),
            PollOutcome::TimedOut { polls: 7 }.into_result()
        );
    }

    fn setup(accelerator: SimulatedAccelerator, max_polls: u32) -> (SimBus, SimDriver) {
        let bus = SimBus::new(40, accelerator);
        let config = Config {
            poll: PollConfig {
                max_polls,
                interval_cycles: 50,
            },
            ..Config::REFERENCE
        };
        let driver = Driver::new(bus.link(FrameTiming::default()), config);
        (bus, driver)
    }

    fn status_reads(bus: &SimBus) -> usize {
        bus.accelerator(|accelerator| {
            accelerator
                .commands()
                .into_iter()
                .filter(|command| *command == Some(Command::ReadStatus))
                .count()
        })
    }

    #[tokio::test]
    async fn stops_at_the_poll_that_reports_done() {
        // Given
        let (bus, mut driver) = setup(SimulatedAccelerator::default().done_after_polls(4), 100);
        driver.start_processing().await.unwrap();

        // When
        let outcome = driver.wait_done().await.unwrap();

        // Then
        assert_eq!(
            PollOutcome::Done {
                polls: 4,
                status: DONE
            },
            outcome
        );
        assert_eq!(4, status_reads(&bus));
    }

    #[tokio::test]
    async fn times_out_at_the_poll_budget() {
        // Given
        let (bus, mut driver) = setup(SimulatedAccelerator::default().never_done(), 20);
        driver.start_processing().await.unwrap();

        // When
        let outcome = driver.wait_done().await.unwrap();

        // Then
        assert_eq!(PollOutcome::TimedOut { polls: 20 }, outcome);
        assert_eq!(20, status_reads(&bus));
    }

    #[tokio::test]
    async fn waits_between_polls() {
        // Given
        let (bus, mut driver) = setup(SimulatedAccelerator::default().done_after_polls(2), 10);
        driver.start_processing().await.unwrap();
        let before = bus.now_ns();

        // When
        driver.wait_done().await.unwrap();

        // Then
        // Each poll waits 50 cycles before its transaction
        assert!(bus.now_ns() - before >= 2 * 50 * 40);
    }
}
