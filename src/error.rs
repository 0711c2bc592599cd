use thiserror::Error;

/// Every fatal condition the sniffer can hit. All of them end the process
/// with exit code 1.
///
/// Wrapped library errors are exposed through `source()` only, so printing
/// the chain with `{:#}` names each cause once.
#[derive(Error, Debug)]
pub enum SnifferError {
    #[error("invalid port '{0}': expected a number between 0 and 65535")]
    InvalidPort(String),

    #[error("invalid frame count {0}: must be at least 1")]
    InvalidCount(u32),

    #[error("no capture devices found")]
    NoDevices,

    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("device {0} is not open")]
    NotOpen(String),

    #[error("failed to list devices")]
    DeviceList(#[source] pcap::Error),

    #[error("failed to open device {device}")]
    DeviceOpen {
        device: String,
        #[source]
        source: pcap::Error,
    },

    #[error("failed to install filter '{filter}'")]
    FilterInstall {
        filter: String,
        #[source]
        source: pcap::Error,
    },

    #[error("capture error")]
    Capture(#[source] pcap::Error),

    #[error("failed to write output")]
    Output(#[from] std::io::Error),
}
