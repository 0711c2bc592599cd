use clap::Parser;

/// Sniffy - Rust packet sniffer
#[derive(Parser, Debug)]
#[command(
    name = "sniffy",
    version,
    about = "Capture frames on a network interface and print a decoded hex dump",
    after_help = "Examples:\n  sniffy -i\n  sniffy -i eth0 -t -p 443 -n 10\n  sniffy -i eth0 --icmp6 --ndp"
)]
pub struct CliArgs {
    /// Interface to capture on. Omit it (or give no value) to list interfaces.
    #[arg(short, long, value_name = "IFACE", num_args = 0..=1, default_missing_value = "")]
    pub interface: Option<String>,

    /// Display TCP segments
    #[arg(short, long)]
    pub tcp: bool,

    /// Display UDP datagrams
    #[arg(short, long)]
    pub udp: bool,

    /// Filter TCP/UDP traffic by port number (0-65535)
    #[arg(short = 'p', value_name = "PORT", allow_hyphen_values = true)]
    pub port: Option<String>,

    /// Display only ICMPv4 packets
    #[arg(long)]
    pub icmp4: bool,

    /// Display only ICMPv6 packets
    #[arg(long)]
    pub icmp6: bool,

    /// Display only ARP frames
    #[arg(long)]
    pub arp: bool,

    /// Display only ICMPv6 NDP packets
    #[arg(long)]
    pub ndp: bool,

    /// Display only IGMP packets
    #[arg(long)]
    pub igmp: bool,

    /// Display only ICMPv6 MLD packets
    #[arg(long)]
    pub mld: bool,

    /// Number of frames to capture
    #[arg(short = 'n', value_name = "COUNT", default_value_t = 1)]
    pub count: u32,
}

impl CliArgs {
    /// The interface to capture on, or `None` when the device list was asked for.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref().filter(|name| !name.is_empty())
    }
}
