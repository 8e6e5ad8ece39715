/// Chrome tab driver over the DevTools protocol.
#[cfg(feature = "chrome")]
pub mod chrome;
