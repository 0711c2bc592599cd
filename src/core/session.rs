use std::fmt;
use std::io::Write;

use log::debug;

use crate::capture::CaptureDevice;
use crate::error::SnifferError;
use crate::filter::FilterExpression;
use crate::packet::{DecodedFrame, FrameDecoder};
use crate::ui::frame::render;

/// Lifecycle of a capture session. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Filtering,
    Capturing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Filtering => write!(f, "filtering"),
            SessionState::Capturing => write!(f, "capturing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Owns the device for one bounded capture run: open, install the filter,
/// print `count` frames, close.
pub struct CaptureSession<D, R, W> {
    device: D,
    decoder: R,
    filter: FilterExpression,
    remaining: u32,
    out: W,
    state: SessionState,
}

impl<D, R, W> CaptureSession<D, R, W>
where
    D: CaptureDevice,
    R: FrameDecoder,
    W: Write,
{
    pub fn new(device: D, decoder: R, filter: FilterExpression, count: u32, out: W) -> Self {
        Self {
            device,
            decoder,
            filter,
            remaining: count,
            out,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Runs the session to completion and returns how many frames were printed.
    ///
    /// Any failure is terminal. The device is closed on every path.
    pub fn run(&mut self) -> Result<u32, SnifferError> {
        let result = self.drive();
        self.device.close();
        self.transition(SessionState::Closed);
        result
    }

    fn drive(&mut self) -> Result<u32, SnifferError> {
        self.transition(SessionState::Opening);
        self.device.open()?;

        self.transition(SessionState::Filtering);
        self.device.install_filter(&self.filter)?;

        self.transition(SessionState::Capturing);
        let link = self.device.link_layer();
        let mut printed = 0;

        while self.remaining > 0 {
            let Some(raw) = self.device.next_frame()? else {
                debug!("{} reached end of stream", self.device.name());
                break;
            };
            let headers = self.decoder.decode(link, &raw.data);
            let frame = DecodedFrame::new(raw, headers);

            self.out.write_all(render(&frame).as_bytes())?;
            self.out.flush()?;

            self.remaining -= 1;
            printed += 1;
        }

        Ok(printed)
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{FrameHeaders, LinkLayer, MacAddr, RawFrame};
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Log {
        opened: bool,
        closed: usize,
        filter: Option<String>,
        delivered: usize,
    }

    struct FakeDevice {
        frames: VecDeque<RawFrame>,
        fail_open: bool,
        fail_filter: bool,
        log: Rc<RefCell<Log>>,
    }

    impl FakeDevice {
        fn with_frames(count: usize) -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log::default()));
            let frames = (0..count)
                .map(|i| RawFrame {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                    wire_len: 4,
                    data: vec![i as u8; 4],
                })
                .collect();
            let device = Self {
                frames,
                fail_open: false,
                fail_filter: false,
                log: Rc::clone(&log),
            };
            (device, log)
        }
    }

    impl CaptureDevice for FakeDevice {
        fn name(&self) -> &str {
            "fake0"
        }

        fn open(&mut self) -> Result<(), SnifferError> {
            if self.fail_open {
                return Err(SnifferError::DeviceOpen {
                    device: "fake0".to_string(),
                    source: pcap::Error::PcapError("permission denied".to_string()),
                });
            }
            self.log.borrow_mut().opened = true;
            Ok(())
        }

        fn install_filter(&mut self, filter: &FilterExpression) -> Result<(), SnifferError> {
            if self.fail_filter {
                return Err(SnifferError::FilterInstall {
                    filter: filter.to_bpf(),
                    source: pcap::Error::PcapError("syntax error".to_string()),
                });
            }
            self.log.borrow_mut().filter = Some(filter.to_bpf());
            Ok(())
        }

        fn link_layer(&self) -> LinkLayer {
            LinkLayer::Ethernet
        }

        fn next_frame(&mut self) -> Result<Option<RawFrame>, SnifferError> {
            let frame = self.frames.pop_front();
            if frame.is_some() {
                self.log.borrow_mut().delivered += 1;
            }
            Ok(frame)
        }

        fn close(&mut self) {
            self.log.borrow_mut().closed += 1;
        }
    }

    /// Counts calls and tags every frame with a fixed source MAC.
    struct CountingDecoder {
        calls: Rc<RefCell<usize>>,
    }

    impl FrameDecoder for CountingDecoder {
        fn decode(&self, _link: LinkLayer, _data: &[u8]) -> FrameHeaders {
            *self.calls.borrow_mut() += 1;
            FrameHeaders {
                src_mac: Some(MacAddr([0xaa, 0, 0, 0, 0, 0x01])),
                ..FrameHeaders::default()
            }
        }
    }

    /// Output sink whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn decoder() -> (CountingDecoder, Rc<RefCell<usize>>) {
        let calls = Rc::new(RefCell::new(0));
        (CountingDecoder { calls: Rc::clone(&calls) }, calls)
    }

    fn tcp_filter() -> FilterExpression {
        crate::filter::compile(&crate::filter::FlagSet {
            tcp: true,
            ..Default::default()
        })
    }

    #[test]
    fn stops_after_requested_count() {
        let (device, log) = FakeDevice::with_frames(10);
        let (decoder, calls) = decoder();
        let mut out = Vec::new();

        let mut session = CaptureSession::new(device, decoder, tcp_filter(), 3, &mut out);
        assert_eq!(session.state(), SessionState::Idle);
        let printed = session.run().unwrap();

        assert_eq!(printed, 3);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.remaining(), 0);
        assert_eq!(*calls.borrow(), 3);

        let log = log.borrow();
        assert!(log.opened);
        assert_eq!(log.filter.as_deref(), Some("tcp"));
        assert_eq!(log.delivered, 3, "no frame pulled past the count");
        assert_eq!(log.closed, 1);

        drop(session);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("timestamp: ").count(), 3);
        assert_eq!(text.matches("src MAC: aa:00:00:00:00:01").count(), 3);
    }

    #[test]
    fn frames_print_in_arrival_order() {
        let (device, _log) = FakeDevice::with_frames(3);
        let (decoder, _) = decoder();
        let mut out = Vec::new();

        CaptureSession::new(device, decoder, FilterExpression::default(), 3, &mut out)
            .run()
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let stamps: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("timestamp: "))
            .collect();
        assert_eq!(
            stamps,
            [
                "2023-11-14T22:13:20.000+00:00",
                "2023-11-14T22:13:21.000+00:00",
                "2023-11-14T22:13:22.000+00:00",
            ]
        );
    }

    #[test]
    fn end_of_stream_closes_early() {
        let (device, log) = FakeDevice::with_frames(2);
        let (decoder, calls) = decoder();
        let mut out = Vec::new();

        let mut session = CaptureSession::new(device, decoder, FilterExpression::default(), 5, &mut out);
        assert_eq!(session.run().unwrap(), 2);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.remaining(), 3);
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(log.borrow().closed, 1);
    }

    #[test]
    fn open_failure_never_captures() {
        let (mut device, log) = FakeDevice::with_frames(5);
        device.fail_open = true;
        let (decoder, calls) = decoder();
        let mut out = Vec::new();

        let mut session = CaptureSession::new(device, decoder, tcp_filter(), 1, &mut out);
        let err = session.run().unwrap_err();

        assert!(matches!(err, SnifferError::DeviceOpen { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(*calls.borrow(), 0);
        let log = log.borrow();
        assert_eq!(log.filter, None);
        assert_eq!(log.delivered, 0);
        assert_eq!(log.closed, 1);

        drop(session);
        assert!(out.is_empty());
    }

    #[test]
    fn filter_failure_never_captures() {
        let (mut device, log) = FakeDevice::with_frames(5);
        device.fail_filter = true;
        let (decoder, calls) = decoder();
        let mut out = Vec::new();

        let mut session = CaptureSession::new(device, decoder, tcp_filter(), 2, &mut out);
        let err = session.run().unwrap_err();

        assert!(matches!(err, SnifferError::FilterInstall { ref filter, .. } if filter == "tcp"));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(*calls.borrow(), 0);
        assert!(log.borrow().opened);
        assert_eq!(log.borrow().delivered, 0);
        assert_eq!(log.borrow().closed, 1);
    }

    #[test]
    fn write_failure_stops_the_session_and_closes_the_device() {
        let (device, log) = FakeDevice::with_frames(5);
        let (decoder, calls) = decoder();

        let mut session = CaptureSession::new(device, decoder, tcp_filter(), 3, ClosedPipe);
        let err = session.run().unwrap_err();

        assert!(matches!(err, SnifferError::Output(ref io) if io.kind() == std::io::ErrorKind::BrokenPipe));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.remaining(), 3, "the failed frame is not counted");
        assert_eq!(*calls.borrow(), 1);
        let log = log.borrow();
        assert_eq!(log.delivered, 1, "no frame pulled after the failure");
        assert_eq!(log.closed, 1);
    }
}
