use std::fmt::{Display, Write};

use crate::packet::{DecodedFrame, MacAddr};
use crate::ui::hexdump::hex_dump;

const NOT_AVAILABLE: &str = "N/A";

/// RFC 3339 with milliseconds and a numeric UTC offset.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Renders one frame: header summary, blank line, hex dump, blank line.
///
/// MAC lines are always printed (`N/A` when there is no Ethernet header).
/// IP and port lines are left out entirely when their layer is missing.
pub fn render(frame: &DecodedFrame) -> String {
    let headers = &frame.headers;
    let mut out = String::new();

    let _ = writeln!(out, "timestamp: {}", frame.timestamp.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out, "src MAC: {}", mac_or_placeholder(headers.src_mac));
    let _ = writeln!(out, "dst MAC: {}", mac_or_placeholder(headers.dst_mac));
    let _ = writeln!(out, "frame length: {} bytes", frame.length);
    write_present(&mut out, "src IP", headers.src_ip);
    write_present(&mut out, "dst IP", headers.dst_ip);
    write_present(&mut out, "src port", headers.src_port);
    write_present(&mut out, "dst port", headers.dst_port);

    out.push('\n');
    out.push_str(&hex_dump(&frame.data));
    out.push('\n');
    out
}

fn mac_or_placeholder(mac: Option<MacAddr>) -> String {
    mac.map_or_else(|| NOT_AVAILABLE.to_string(), |mac| mac.to_string())
}

fn write_present<T: Display>(out: &mut String, label: &str, value: Option<T>) {
    if let Some(value) = value {
        let _ = writeln!(out, "{label}: {value}");
    }
}
