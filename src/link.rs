/// Blocking I2C link to a single node.
///
/// Device drivers written against this trait work over any bridge; the
/// MCP2221 session is one implementation.
pub trait I2cLink {
    type Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    fn read(&mut self, count: usize) -> Result<Vec<u8>, Self::Error>;

    /// Write then read without releasing the bus in between.
    fn write_and_read(
        &mut self,
        send_from: &[u8],
        receive_count: usize,
    ) -> Result<Vec<u8>, Self::Error>;

    fn supports_clock_stretching(&self) -> bool;
}
