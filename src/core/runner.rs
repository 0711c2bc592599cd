use std::io;

use anyhow::{Context, Result};
use log::info;

use crate::capture::{list_device_names, resolve_device, PcapDevice};
use crate::cli::CliArgs;
use crate::core::session::CaptureSession;
use crate::error::SnifferError;
use crate::filter::{compile, FlagSet};
use crate::packet::EtherparseDecoder;
use crate::ui::device::print_device_list;

/// Validates the input, then either lists interfaces or runs one capture session.
pub fn run(args: &CliArgs) -> Result<()> {
    // Bad input must fail before any device is touched.
    let flags = FlagSet::from_args(args)?;

    let Some(name) = args.interface() else {
        return list_devices();
    };

    let available = list_device_names()?;
    let config = resolve_device(name, &available)?;

    let filter = compile(&flags);
    if flags.port.is_some() && !(flags.tcp || flags.udp) {
        info!("port given without --tcp or --udp, it does not narrow the filter");
    }
    let protocols: Vec<String> = flags.selected().iter().map(ToString::to_string).collect();
    info!(
        "capturing {} frame(s) on {name}, protocols [{}], filter '{filter}' ({} clause(s))",
        flags.count,
        protocols.join(", "),
        filter.clauses().len()
    );

    let stdout = io::stdout();
    let mut session = CaptureSession::new(
        PcapDevice::new(config),
        EtherparseDecoder,
        filter,
        flags.count,
        stdout.lock(),
    );
    let printed = session
        .run()
        .with_context(|| format!("capture on {name} failed"))?;

    info!("session closed after {printed} frame(s)");
    Ok(())
}

fn list_devices() -> Result<()> {
    let names = list_device_names()?;
    if names.is_empty() {
        return Err(SnifferError::NoDevices.into());
    }
    print_device_list(&mut io::stdout().lock(), &names).context("printing interfaces")?;
    Ok(())
}
