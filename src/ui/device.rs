// src/ui/device.rs
use std::io::{self, Write};

/// Prints the interface names one per line under a short header.
pub fn print_device_list<W: Write>(out: &mut W, names: &[String]) -> io::Result<()> {
    writeln!(out, "Active network interfaces:")?;
    for name in names {
        writeln!(out, "{name}")?;
    }
    out.flush()
}
