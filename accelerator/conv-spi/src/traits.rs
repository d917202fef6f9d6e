use embedded_hal::digital::ErrorType;

/// The clock a [`SerialLink`](crate::SerialLink) is synchronized to.
///
/// Every wait of the protocol goes through the clock, so the same driver runs against
/// hardware or against a virtual clock with deterministic timing.
#[allow(async_fn_in_trait)]
pub trait BusClock: ErrorType {
    /// The bus clock period in nanoseconds.
    fn period_ns(&self) -> u32;

    /// Monotonic timestamp in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Wait for the next falling edge.
    async fn falling_edge(&mut self) -> Result<(), Self::Error>;

    /// Wait for the next rising edge.
    async fn rising_edge(&mut self) -> Result<(), Self::Error>;

    async fn delay_ns(&mut self, ns: u32) -> Result<(), Self::Error>;

    /// Wait for `count` full bus clock cycles.
    async fn cycles(&mut self, count: u32) -> Result<(), Self::Error> {
        for _ in 0..count {
            self.rising_edge().await?;
        }
        Ok(())
    }
}
