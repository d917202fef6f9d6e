use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::traits::BusClock;

/// A bus clock generated by the host on a GPIO.
///
/// The clock idles low and only runs while the driver waits for edges.
/// Every level is held for half a period, timestamps count the paced time.
pub struct BitBangClock<Sclk: OutputPin, Delay: DelayNs> {
    sclk: Sclk,
    delay: Delay,
    period_ns: u32,
    high: bool,
    elapsed_ns: u64,
}

impl<Sclk: OutputPin, Delay: DelayNs> BitBangClock<Sclk, Delay> {
    pub fn new(mut sclk: Sclk, delay: Delay, period_ns: u32) -> Result<Self, Sclk::Error> {
        assert!(period_ns >= 2);
        sclk.set_low()?;
        Ok(Self {
            sclk,
            delay,
            period_ns,
            high: false,
            elapsed_ns: 0,
        })
    }

    pub fn release(self) -> (Sclk, Delay) {
        (self.sclk, self.delay)
    }

    async fn edge(&mut self, high: bool) -> Result<(), Sclk::Error> {
        self.delay_ns(self.period_ns / 2).await?;
        if high {
            self.sclk.set_high()?;
        } else {
            self.sclk.set_low()?;
        }
        self.high = high;
        Ok(())
    }
}

impl<Sclk: OutputPin, Delay: DelayNs> ErrorType for BitBangClock<Sclk, Delay> {
    type Error = Sclk::Error;
}

impl<Sclk: OutputPin, Delay: DelayNs> BusClock for BitBangClock<Sclk, Delay> {
    fn period_ns(&self) -> u32 {
        self.period_ns
    }

    fn now_ns(&self) -> u64 {
        self.elapsed_ns
    }

    async fn falling_edge(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.edge(true).await?;
        }
        self.edge(false).await
    }

    async fn rising_edge(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.edge(false).await?;
        }
        self.edge(true).await
    }

    async fn delay_ns(&mut self, ns: u32) -> Result<(), Self::Error> {
        self.delay.delay_ns(ns).await;
        self.elapsed_ns += ns as u64;
        Ok(())
    }
}
