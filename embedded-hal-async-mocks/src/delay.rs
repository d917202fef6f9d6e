use embedded_hal_async::delay;
use mockall::mock;

mock! {
    #[derive(Debug)]
    pub Delay {}

    impl delay::DelayNs for Delay {
        async fn delay_ns(&mut self, ns: u32);
    }
}

impl MockDelay {
    /// Accept any delay, any number of times.
    pub fn permissive() -> Self {
        let mut delay = Self::new();
        delay.expect_delay_ns().return_const(());
        delay
    }
}
