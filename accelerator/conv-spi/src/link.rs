//! Bit level serial link to the accelerator.
//!
//! The link runs SPI mode 0 against the bus clock:
//!
//! Step                Clock edge      Lines
//! assert_select()     rising          CS low, then settle
//! transfer_byte()     falling         drive MOSI (MSB first)
//!                     rising          sample MISO
//!                     ... 8 times, then MOSI is parked low
//! deassert_select()   falling         CS high, then idle
//!
//! Selecting on a rising edge makes the first falling edge after select the first
//! driving edge, so the slave sees exactly 8 rising edges per byte while selected.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::{traits::BusClock, DriverError, FrameTiming};

pub struct SerialLink<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    clock: Clock,
    mosi: Mosi,
    miso: Miso,
    cs: Cs,
    timing: FrameTiming,
    selected: bool,
    bits_in_frame: u32,
}

impl<Clock, Mosi, Miso, Cs> SerialLink<Clock, Mosi, Miso, Cs>
where
    Clock: BusClock,
    Mosi: OutputPin,
    Miso: InputPin,
    Cs: OutputPin,
{
    /// Create a link over the given bus lines.
    ///
    /// # Panics
    ///
    /// Panics if the chip select settle time of `timing` is not shorter than half a
    /// clock period, as the first falling edge of a frame would then come before the
    /// slave has settled.
    pub fn new(clock: Clock, mosi: Mosi, miso: Miso, cs: Cs, timing: FrameTiming) -> Self {
        let period_ns = clock.period_ns();
        assert!(timing.settle_ns(period_ns) < period_ns / 2);

        Self {
            clock,
            mosi,
            miso,
            cs,
            timing,
            selected: false,
            bits_in_frame: 0,
        }
    }

    pub fn release(self) -> (Clock, Mosi, Miso, Cs) {
        (self.clock, self.mosi, self.miso, self.cs)
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn period_ns(&self) -> u32 {
        self.clock.period_ns()
    }

    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    /// Park the bus: chip select released, MOSI low, and wait one idle period.
    ///
    /// Also closes a frame left open by a failed transaction, whatever the bit count.
    pub async fn idle(&mut self) -> Result<(), DriverError> {
        self.selected = false;
        self.bits_in_frame = 0;
        self.cs.set_high().map_err(DriverError::pin)?;
        self.mosi.set_low().map_err(DriverError::pin)?;

        let idle_ns = self.timing.idle_ns(self.clock.period_ns());
        self.delay_ns(idle_ns).await
    }

    /// Lower chip select on a rising edge and wait for the slave to settle.
    pub async fn assert_select(&mut self) -> Result<(), DriverError> {
        assert!(!self.selected);

        self.clock.rising_edge().await.map_err(DriverError::pin)?;
        self.cs.set_low().map_err(DriverError::pin)?;
        self.selected = true;
        self.bits_in_frame = 0;

        let settle_ns = self.timing.settle_ns(self.clock.period_ns());
        self.delay_ns(settle_ns).await
    }

    /// Raise chip select on a falling edge and hold the bus idle.
    pub async fn deassert_select(&mut self) -> Result<(), DriverError> {
        assert!(self.selected);
        // A byte is never split across a frame boundary.
        assert_eq!(0, self.bits_in_frame % 8);

        self.clock.falling_edge().await.map_err(DriverError::pin)?;
        self.cs.set_high().map_err(DriverError::pin)?;
        self.selected = false;

        let idle_ns = self.timing.idle_ns(self.clock.period_ns());
        self.delay_ns(idle_ns).await
    }

    /// Exchange one byte, most significant bit first in both directions.
    pub async fn transfer_byte(&mut self, tx: u8) -> Result<u8, DriverError> {
        let mut rx = 0;
        for bit in (0..8).rev() {
            self.clock.falling_edge().await.map_err(DriverError::pin)?;
            if tx & (1 << bit) != 0 {
                self.mosi.set_high().map_err(DriverError::pin)?;
            } else {
                self.mosi.set_low().map_err(DriverError::pin)?;
            }

            self.clock.rising_edge().await.map_err(DriverError::pin)?;
            if self.miso.is_high().map_err(DriverError::pin)? {
                rx |= 1 << bit;
            }
            self.bits_in_frame += 1;
        }

        self.mosi.set_low().map_err(DriverError::pin)?;
        Ok(rx)
    }

    /// Wait for `count` bus clock cycles.
    pub async fn wait_cycles(&mut self, count: u32) -> Result<(), DriverError> {
        self.clock.cycles(count).await.map_err(DriverError::pin)
    }

    pub async fn delay_ns(&mut self, ns: u32) -> Result<(), DriverError> {
        self.clock.delay_ns(ns).await.map_err(DriverError::pin)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::digital::ErrorKind;
    use embedded_hal_async_mocks::digital::{MockInputPin, MockOutputPin};
    use mockall::Sequence;

    use crate::sim::VirtualClock;

    use super::*;

    const PERIOD_NS: u32 = 40;

    fn bits(byte: u8) -> [bool; 8] {
        core::array::from_fn(|i| byte & (0x80 >> i) != 0)
    }

    #[tokio::test]
    async fn transfer_byte_receives_msb_first() {
        // Given
        let mut seq = Sequence::new();
        let mut miso = MockInputPin::new();
        miso.expect_byte(&mut seq, 0xA5);

        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            MockOutputPin::permissive(),
            miso,
            MockOutputPin::permissive(),
            FrameTiming::default(),
        );

        // When
        let rx = link.transfer_byte(0x00).await.unwrap();

        // Then
        assert_eq!(0xA5, rx);
    }

    #[tokio::test]
    async fn transfer_byte_drives_msb_first_and_parks_low() {
        // Given
        let mut seq = Sequence::new();
        let mut mosi = MockOutputPin::new();
        mosi.expect_levels(&mut seq, &bits(0x5A));
        mosi.expect_levels(&mut seq, &[false]);

        let mut miso = MockInputPin::new();
        miso.expect_is_high().times(8).return_const(Ok(false));

        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            mosi,
            miso,
            MockOutputPin::permissive(),
            FrameTiming::default(),
        );

        // When
        let rx = link.transfer_byte(0x5A).await.unwrap();

        // Then
        assert_eq!(0x00, rx);
        // 8 falling and 8 rising edges, ending on the 8th rising edge
        assert_eq!(8 * PERIOD_NS as u64, link.now_ns());
    }

    #[tokio::test]
    async fn frame_is_aligned_to_clock_edges() {
        // Given
        let mut seq = Sequence::new();
        let mut cs = MockOutputPin::new();
        cs.expect_levels(&mut seq, &[false, true]);

        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            MockOutputPin::permissive(),
            MockInputPin::new(),
            cs,
            FrameTiming::default(),
        );

        // When
        link.assert_select().await.unwrap();

        // Then
        // Rising edge at 40 ns, then a quarter period settle
        assert!(link.is_selected());
        assert_eq!(50, link.now_ns());

        // When
        link.deassert_select().await.unwrap();

        // Then
        // Falling edge at 60 ns, then a full period idle
        assert!(!link.is_selected());
        assert_eq!(100, link.now_ns());
    }

    #[tokio::test]
    async fn idle_releases_select() {
        // Given
        let mut cs = MockOutputPin::new();
        cs.expect_set_high().times(1).return_const(Ok(()));
        let mut mosi = MockOutputPin::new();
        mosi.expect_set_low().times(1).return_const(Ok(()));

        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            mosi,
            MockInputPin::new(),
            cs,
            FrameTiming {
                idle_ns: Some(100),
                ..Default::default()
            },
        );

        // When
        link.idle().await.unwrap();

        // Then
        assert_eq!(100, link.now_ns());
    }

    #[tokio::test]
    async fn sampling_error_is_reported() {
        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            MockOutputPin::permissive(),
            MockInputPin::failing(),
            MockOutputPin::permissive(),
            FrameTiming::default(),
        );

        let result = link.transfer_byte(0xFF).await;

        assert_eq!(Err(DriverError::Pin(ErrorKind::Other)), result);
    }

    #[tokio::test]
    async fn idle_closes_frame_left_open_mid_byte() {
        // Given
        let mut link = SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            MockOutputPin::permissive(),
            MockInputPin::failing(),
            MockOutputPin::permissive(),
            FrameTiming::default(),
        );
        link.assert_select().await.unwrap();
        assert!(link.transfer_byte(0xFF).await.is_err());
        assert!(link.is_selected());

        // When
        link.idle().await.unwrap();

        // Then
        assert!(!link.is_selected());
        link.assert_select().await.unwrap();
        assert!(link.is_selected());
    }

    #[test]
    #[should_panic]
    fn settle_must_fit_before_first_falling_edge() {
        SerialLink::new(
            VirtualClock::standalone(PERIOD_NS),
            MockOutputPin::permissive(),
            MockInputPin::new(),
            MockOutputPin::permissive(),
            FrameTiming {
                settle_ns: Some(PERIOD_NS / 2),
                ..Default::default()
            },
        );
    }
}
