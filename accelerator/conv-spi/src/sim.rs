//! Deterministic simulation of the bus and the accelerator.
//!
//! A [`SimBus`] is shared by a [`VirtualClock`], the MOSI and CS pins, the MISO pin and a
//! [`SimulatedAccelerator`] that decodes the protocol bit by bit. Virtual time only moves
//! when the driver waits on the clock.

use alloc::{rc::Rc, vec, vec::Vec};
use core::{cell::RefCell, convert::Infallible};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::{traits::BusClock, Command, Driver, FrameTiming, SerialLink, StatusByte};

pub type SimLink = SerialLink<VirtualClock, SimOutputPin, SimInputPin, SimOutputPin>;
pub type SimDriver = Driver<VirtualClock, SimOutputPin, SimInputPin, SimOutputPin>;

#[derive(Clone)]
pub struct SimBus {
    state: Rc<RefCell<BusState>>,
}

struct BusState {
    now_ns: u64,
    period_ns: u32,
    mosi: bool,
    miso: bool,
    cs_n: bool,
    accelerator: SimulatedAccelerator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Line {
    Mosi,
    ChipSelect,
}

impl SimBus {
    pub fn new(period_ns: u32, accelerator: SimulatedAccelerator) -> Self {
        assert!(period_ns >= 2);
        Self {
            state: Rc::new(RefCell::new(BusState {
                now_ns: 0,
                period_ns,
                mosi: false,
                miso: false,
                cs_n: true,
                accelerator,
            })),
        }
    }

    pub fn split(&self) -> (VirtualClock, SimOutputPin, SimInputPin, SimOutputPin) {
        (
            VirtualClock {
                state: self.state.clone(),
            },
            SimOutputPin {
                state: self.state.clone(),
                line: Line::Mosi,
            },
            SimInputPin {
                state: self.state.clone(),
            },
            SimOutputPin {
                state: self.state.clone(),
                line: Line::ChipSelect,
            },
        )
    }

    pub fn link(&self, timing: FrameTiming) -> SimLink {
        let (clock, mosi, miso, cs) = self.split();
        SerialLink::new(clock, mosi, miso, cs, timing)
    }

    pub fn now_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    /// Inspect the simulated accelerator.
    pub fn accelerator<R>(&self, f: impl FnOnce(&SimulatedAccelerator) -> R) -> R {
        f(&self.state.borrow().accelerator)
    }
}

impl BusState {
    fn next_rising(&self) -> u64 {
        let period = self.period_ns as u64;
        (self.now_ns / period + 1) * period
    }

    fn next_falling(&self) -> u64 {
        let period = self.period_ns as u64;
        let half = period / 2;
        if self.now_ns < half {
            half
        } else {
            half + ((self.now_ns - half) / period + 1) * period
        }
    }
}

/// A free-running virtual bus clock. Rising edges are at whole periods.
pub struct VirtualClock {
    state: Rc<RefCell<BusState>>,
}

impl VirtualClock {
    /// A clock on a bus of its own, with an idle accelerator.
    pub fn standalone(period_ns: u32) -> Self {
        SimBus::new(period_ns, SimulatedAccelerator::default()).split().0
    }
}

impl ErrorType for VirtualClock {
    type Error = Infallible;
}

impl BusClock for VirtualClock {
    fn period_ns(&self) -> u32 {
        self.state.borrow().period_ns
    }

    fn now_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    async fn falling_edge(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.now_ns = state.next_falling();
        if !state.cs_n {
            state.miso = state.accelerator.shift_out();
        }
        Ok(())
    }

    async fn rising_edge(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.now_ns = state.next_rising();
        if !state.cs_n {
            let mosi = state.mosi;
            state.accelerator.shift_in(mosi);
        }
        Ok(())
    }

    async fn delay_ns(&mut self, ns: u32) -> Result<(), Self::Error> {
        self.state.borrow_mut().now_ns += ns as u64;
        Ok(())
    }
}

pub struct SimOutputPin {
    state: Rc<RefCell<BusState>>,
    line: Line,
}

impl SimOutputPin {
    fn drive(&mut self, high: bool) {
        let mut state = self.state.borrow_mut();
        match self.line {
            Line::Mosi => state.mosi = high,
            Line::ChipSelect => {
                if state.cs_n && !high {
                    state.miso = state.accelerator.select();
                } else if !state.cs_n && high {
                    state.accelerator.deselect();
                }
                state.cs_n = high;
            }
        }
    }
}

impl ErrorType for SimOutputPin {
    type Error = Infallible;
}

impl OutputPin for SimOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

pub struct SimInputPin {
    state: Rc<RefCell<BusState>>,
}

impl ErrorType for SimInputPin {
    type Error = Infallible;
}

impl InputPin for SimInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state.borrow().miso)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.borrow().miso)
    }
}

/// One chip select bracket as seen by the accelerator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Bytes received from the host, the command byte first
    pub received: Vec<u8>,
    /// Bytes shifted out to the host, one per received byte
    pub sent: Vec<u8>,
    /// Rising edges while selected
    pub rising_edges: u32,
    /// Bits of an incomplete trailing byte
    pub partial_bits: u8,
}

impl Frame {
    pub fn command(&self) -> Option<Command> {
        self.received.first().copied().and_then(Command::from_u8)
    }

    pub fn payload(&self) -> &[u8] {
        self.received.get(1..).unwrap_or(&[])
    }
}

/// Slave side of the protocol.
///
/// Written blocks are stored as received. After StartProcessing the accelerator reports busy
/// until the configured number of status reads, and done from then on. The result block is
/// fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct SimulatedAccelerator {
    results: Vec<u8>,
    done_after_polls: Option<u32>,
    weights: Vec<u8>,
    patch: Vec<u8>,
    biases: Vec<u8>,
    running: bool,
    finished: bool,
    starts: u32,
    status_reads: u32,
    polls_since_start: u32,

    bit_count: u8,
    rx_shift: u8,
    tx_byte: u8,
    current: Option<Frame>,
    frames: Vec<Frame>,
}

impl SimulatedAccelerator {
    /// An accelerator that is done at the first status read after a start.
    pub fn new(results: Vec<u8>) -> Self {
        Self {
            results,
            done_after_polls: Some(1),
            ..Default::default()
        }
    }

    /// Report done at the `polls`-th status read after a start.
    pub fn done_after_polls(mut self, polls: u32) -> Self {
        assert!(polls > 0);
        self.done_after_polls = Some(polls);
        self
    }

    pub fn never_done(mut self) -> Self {
        self.done_after_polls = None;
        self
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    pub fn patch(&self) -> &[u8] {
        &self.patch
    }

    pub fn biases(&self) -> &[u8] {
        &self.biases
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn commands(&self) -> Vec<Option<Command>> {
        self.frames.iter().map(Frame::command).collect()
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn status(&self) -> StatusByte {
        StatusByte::new(self.running, self.finished)
    }

    fn select(&mut self) -> bool {
        self.bit_count = 0;
        self.rx_shift = 0;
        self.tx_byte = 0x00;
        self.current = Some(Frame::default());
        self.tx_byte & 0x80 != 0
    }

    fn deselect(&mut self) {
        if let Some(mut frame) = self.current.take() {
            frame.partial_bits = self.bit_count;
            self.frames.push(frame);
        }
        self.bit_count = 0;
    }

    fn shift_out(&self) -> bool {
        self.tx_byte & (0x80 >> self.bit_count) != 0
    }

    fn shift_in(&mut self, mosi: bool) {
        let Some(frame) = self.current.as_mut() else {
            return;
        };
        frame.rising_edges += 1;

        self.rx_shift = (self.rx_shift << 1) | mosi as u8;
        self.bit_count += 1;
        if self.bit_count == 8 {
            let byte = self.rx_shift;
            frame.received.push(byte);
            frame.sent.push(self.tx_byte);
            self.bit_count = 0;
            self.rx_shift = 0;
            self.tx_byte = self.on_byte(byte);
        }
    }

    /// Handle a complete byte and return the next byte to shift out.
    fn on_byte(&mut self, byte: u8) -> u8 {
        let (index, command) = match self.current.as_ref() {
            Some(frame) => (frame.received.len() - 1, frame.command()),
            None => return 0x00,
        };

        if index == 0 {
            return match command {
                Some(Command::WriteWeights) => {
                    self.weights.clear();
                    0x00
                }
                Some(Command::WritePatch) => {
                    self.patch.clear();
                    0x00
                }
                Some(Command::WriteBiases) => {
                    self.biases.clear();
                    0x00
                }
                Some(Command::StartProcessing) => {
                    self.start();
                    0x00
                }
                Some(Command::ReadStatus) => self.read_status().0,
                Some(Command::ReadResults) => self.results.first().copied().unwrap_or(0x00),
                None => 0x00,
            };
        }

        match command {
            Some(Command::WriteWeights) => self.weights.push(byte),
            Some(Command::WritePatch) => self.patch.push(byte),
            Some(Command::WriteBiases) => self.biases.push(byte),
            Some(Command::ReadResults) => return self.results.get(index).copied().unwrap_or(0x00),
            _ => {}
        }
        0x00
    }

    fn start(&mut self) {
        self.running = true;
        self.finished = false;
        self.polls_since_start = 0;
        self.starts += 1;
    }

    fn read_status(&mut self) -> StatusByte {
        self.status_reads += 1;
        if self.running {
            self.polls_since_start += 1;
            if self
                .done_after_polls
                .is_some_and(|polls| self.polls_since_start >= polls)
            {
                self.running = false;
                self.finished = true;
            }
        }
        self.status()
    }
}

impl SimulatedAccelerator {
    /// A result block of `len` bytes counting up from `first`.
    pub fn counting_results(first: u8, len: usize) -> Vec<u8> {
        let mut results = vec![0; len];
        for (i, byte) in results.iter_mut().enumerate() {
            *byte = first.wrapping_add(i as u8);
        }
        results
    }
}
