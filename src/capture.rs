use chrono::{DateTime, Utc};
use log::{info, trace};
use pcap::{Active, Capture, Device};

use crate::error::SnifferError;
use crate::filter::FilterExpression;
use crate::packet::{LinkLayer, RawFrame};

/// Settings for opening a live capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub device_name: String,
    pub snaplen: i32,
    pub promiscuous: bool,
    /// Hand frames over as soon as they arrive instead of batching them.
    pub immediate: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            snaplen: 65535,
            promiscuous: true,
            immediate: true,
        }
    }
}

impl CaptureConfig {
    pub fn for_device(name: impl Into<String>) -> Self {
        Self {
            device_name: name.into(),
            ..Self::default()
        }
    }
}

/// A source of raw frames the capture session can drive.
pub trait CaptureDevice {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), SnifferError>;

    fn install_filter(&mut self, filter: &FilterExpression) -> Result<(), SnifferError>;

    fn link_layer(&self) -> LinkLayer;

    /// Blocks until the next frame arrives. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, SnifferError>;

    /// Releases the underlying handle. Safe to call more than once.
    fn close(&mut self);
}

/// Live capture through libpcap.
pub struct PcapDevice {
    config: CaptureConfig,
    handle: Option<Capture<Active>>,
}

impl PcapDevice {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config, handle: None }
    }

    fn handle_mut(&mut self) -> Result<&mut Capture<Active>, SnifferError> {
        let name = &self.config.device_name;
        self.handle
            .as_mut()
            .ok_or_else(|| SnifferError::NotOpen(name.clone()))
    }
}

impl CaptureDevice for PcapDevice {
    fn name(&self) -> &str {
        &self.config.device_name
    }

    fn open(&mut self) -> Result<(), SnifferError> {
        let open_err = |source: pcap::Error| SnifferError::DeviceOpen {
            device: self.config.device_name.clone(),
            source,
        };

        let cap = Capture::from_device(self.config.device_name.as_str())
            .map_err(open_err)?
            .snaplen(self.config.snaplen)
            .promisc(self.config.promiscuous)
            .immediate_mode(self.config.immediate)
            .open()
            .map_err(open_err)?;

        info!("opened {} (promiscuous: {})", self.config.device_name, self.config.promiscuous);
        self.handle = Some(cap);
        Ok(())
    }

    fn install_filter(&mut self, filter: &FilterExpression) -> Result<(), SnifferError> {
        let program = filter.to_bpf();
        let cap = self.handle_mut()?;
        cap.filter(&program, true)
            .map_err(|source| SnifferError::FilterInstall {
                filter: program.clone(),
                source,
            })?;

        if program.is_empty() {
            info!("no filter applied, capturing all traffic");
        } else {
            info!("filter applied: {program}");
        }
        Ok(())
    }

    fn link_layer(&self) -> LinkLayer {
        self.handle
            .as_ref()
            .map_or(LinkLayer::Ethernet, |cap| LinkLayer::from_dlt(cap.get_datalink().0))
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, SnifferError> {
        let cap = self.handle_mut()?;
        loop {
            match cap.next_packet() {
                Ok(packet) => {
                    let timestamp = timestamp_from_timeval(
                        packet.header.ts.tv_sec as i64,
                        packet.header.ts.tv_usec as i64,
                    );
                    return Ok(Some(RawFrame {
                        timestamp,
                        wire_len: packet.header.len,
                        data: packet.data.to_vec(),
                    }));
                }
                Err(pcap::Error::TimeoutExpired) => {
                    trace!("read timeout, still waiting");
                }
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(err) => return Err(SnifferError::Capture(err)),
            }
        }
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            info!("closed {}", self.config.device_name);
        }
    }
}

impl Drop for PcapDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn timestamp_from_timeval(secs: i64, usecs: i64) -> DateTime<Utc> {
    let nanos = (usecs.clamp(0, 999_999) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Names of every interface libpcap can capture on.
pub fn list_device_names() -> Result<Vec<String>, SnifferError> {
    let devices = Device::list().map_err(SnifferError::DeviceList)?;
    Ok(devices.into_iter().map(|d| d.name).collect())
}

/// Checks that `name` is a known interface before anything is opened.
pub fn resolve_device(name: &str, available: &[String]) -> Result<CaptureConfig, SnifferError> {
    if available.is_empty() {
        return Err(SnifferError::NoDevices);
    }
    available
        .iter()
        .find(|candidate| candidate.as_str() == name)
        .map(|found| CaptureConfig::for_device(found.as_str()))
        .ok_or_else(|| SnifferError::DeviceNotFound(name.to_string()))
}
