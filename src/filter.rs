use std::fmt;

use crate::cli::CliArgs;
use crate::error::SnifferError;

/// ICMPv6 types for neighbor solicitation and neighbor advertisement.
const NDP_TYPES: [u8; 2] = [135, 136];
/// ICMPv6 types for multicast listener query, report and done.
const MLD_TYPES: [u8; 3] = [130, 131, 132];

/// A protocol switch the user can turn on from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp4,
    Icmp6,
    Arp,
    Ndp,
    Igmp,
    Mld,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Icmp4 => write!(f, "ICMPv4"),
            Protocol::Icmp6 => write!(f, "ICMPv6"),
            Protocol::Arp => write!(f, "ARP"),
            Protocol::Ndp => write!(f, "NDP"),
            Protocol::Igmp => write!(f, "IGMP"),
            Protocol::Mld => write!(f, "MLD"),
        }
    }
}

/// The user's protocol selection, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    pub tcp: bool,
    pub udp: bool,
    pub icmp4: bool,
    pub icmp6: bool,
    pub arp: bool,
    pub ndp: bool,
    pub igmp: bool,
    pub mld: bool,
    pub port: Option<u16>,
    pub count: u32,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            tcp: false,
            udp: false,
            icmp4: false,
            icmp6: false,
            arp: false,
            ndp: false,
            igmp: false,
            mld: false,
            port: None,
            count: 1,
        }
    }
}

impl FlagSet {
    /// Validates the raw command line values. Fails before any device is touched.
    pub fn from_args(args: &CliArgs) -> Result<Self, SnifferError> {
        let port = args.port.as_deref().map(parse_port).transpose()?;
        if args.count == 0 {
            return Err(SnifferError::InvalidCount(args.count));
        }

        Ok(Self {
            tcp: args.tcp,
            udp: args.udp,
            icmp4: args.icmp4,
            icmp6: args.icmp6,
            arp: args.arp,
            ndp: args.ndp,
            igmp: args.igmp,
            mld: args.mld,
            port,
            count: args.count,
        })
    }

    pub fn is_selected(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
            Protocol::Icmp4 => self.icmp4,
            Protocol::Icmp6 => self.icmp6,
            Protocol::Arp => self.arp,
            Protocol::Ndp => self.ndp,
            Protocol::Igmp => self.igmp,
            Protocol::Mld => self.mld,
        }
    }

    /// Protocols turned on, in clause order.
    pub fn selected(&self) -> Vec<Protocol> {
        CLAUSE_TABLE
            .iter()
            .map(|(protocol, _)| *protocol)
            .filter(|protocol| self.is_selected(*protocol))
            .collect()
    }
}

/// Parses the `-p` argument. Anything that is not a number in 0..=65535 is rejected.
pub fn parse_port(raw: &str) -> Result<u16, SnifferError> {
    let invalid = || SnifferError::InvalidPort(raw.to_string());
    // `u16::from_str` tolerates a leading '+'; ports are bare digits only.
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse::<u16>().map_err(|_| invalid())
}

/// A capture filter in libpcap syntax. Empty matches every frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    clauses: Vec<String>,
}

impl FilterExpression {
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The expression as handed to libpcap.
    pub fn to_bpf(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // BPF `and`/`or` share precedence, so compound clauses need grouping.
        let grouped = self.clauses.len() > 1;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            if grouped && clause.contains(' ') {
                write!(f, "({clause})")?;
            } else {
                write!(f, "{clause}")?;
            }
        }
        Ok(())
    }
}

type ClauseBuilder = fn(Option<u16>) -> String;

/// Fixed clause order: tcp, udp, icmp4, icmp6, arp, ndp, igmp, mld.
const CLAUSE_TABLE: [(Protocol, ClauseBuilder); 8] = [
    (Protocol::Tcp, tcp_clause),
    (Protocol::Udp, udp_clause),
    (Protocol::Icmp4, icmp4_clause),
    (Protocol::Icmp6, icmp6_clause),
    (Protocol::Arp, arp_clause),
    (Protocol::Ndp, ndp_clause),
    (Protocol::Igmp, igmp_clause),
    (Protocol::Mld, mld_clause),
];

fn port_scoped(protocol: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{protocol} and port {port}"),
        None => protocol.to_string(),
    }
}

fn icmp6_refinement(types: &[u8]) -> String {
    let codes = types
        .iter()
        .map(|code| format!("icmp6[0] == {code}"))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("icmp6 and ({codes})")
}

fn tcp_clause(port: Option<u16>) -> String {
    port_scoped("tcp", port)
}

fn udp_clause(port: Option<u16>) -> String {
    port_scoped("udp", port)
}

fn icmp4_clause(_: Option<u16>) -> String {
    "icmp".to_string()
}

fn icmp6_clause(_: Option<u16>) -> String {
    "icmp6".to_string()
}

fn arp_clause(_: Option<u16>) -> String {
    "arp".to_string()
}

fn ndp_clause(_: Option<u16>) -> String {
    icmp6_refinement(&NDP_TYPES)
}

fn igmp_clause(_: Option<u16>) -> String {
    "igmp".to_string()
}

fn mld_clause(_: Option<u16>) -> String {
    icmp6_refinement(&MLD_TYPES)
}

/// Turns the flag set into a single disjunctive capture filter.
///
/// Only the tcp and udp clauses take the port; a port given without either
/// of them does not narrow anything. NDP and MLD expand to their ICMPv6
/// sub-type clause and are emitted even when bare icmp6 is also selected.
pub fn compile(flags: &FlagSet) -> FilterExpression {
    let clauses = CLAUSE_TABLE
        .iter()
        .filter(|(protocol, _)| flags.is_selected(*protocol))
        .map(|(_, build)| build(flags.port))
        .collect();

    FilterExpression { clauses }
}
