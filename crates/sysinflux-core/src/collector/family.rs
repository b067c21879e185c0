//! Metric families.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Network counters, receive side first, in `/proc/net/dev` order.
pub const NETWORK_COUNTERS: [&str; 16] = [
    "recv_bytes",
    "recv_packets",
    "recv_errs",
    "recv_drop",
    "recv_fifo",
    "recv_frame",
    "recv_compressed",
    "recv_multicast",
    "trans_bytes",
    "trans_packets",
    "trans_errs",
    "trans_drop",
    "trans_fifo",
    "trans_colls",
    "trans_carrier",
    "trans_compressed",
];

/// Block device counters in `/proc/diskstats` order.
pub const DISK_COUNTERS: [&str; 11] = [
    "read_ios",
    "read_merges",
    "read_sectors",
    "read_ticks",
    "write_ios",
    "write_merges",
    "write_sectors",
    "write_ticks",
    "in_flight",
    "io_ticks",
    "time_in_queue",
];

/// A category of metrics sampled from one OS source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Cpu,
    Cpus,
    Mem,
    Swap,
    Uptime,
    Load,
    Network,
    Disks,
    Mounts,
}

impl Family {
    /// Every family, in default collection order.
    pub const ALL: [Family; 9] = [
        Family::Cpu,
        Family::Cpus,
        Family::Mem,
        Family::Swap,
        Family::Uptime,
        Family::Load,
        Family::Network,
        Family::Disks,
        Family::Mounts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::Cpu => "cpu",
            Family::Cpus => "cpus",
            Family::Mem => "mem",
            Family::Swap => "swap",
            Family::Uptime => "uptime",
            Family::Load => "load",
            Family::Network => "network",
            Family::Disks => "disks",
            Family::Mounts => "mounts",
        }
    }

    /// Column layout of this family's table.
    pub fn columns(self) -> Vec<&'static str> {
        match self {
            Family::Cpu | Family::Cpus => {
                vec!["id", "user", "nice", "sys", "idle", "wait", "total"]
            }
            Family::Mem => vec!["free", "used", "actualfree", "actualused", "total"],
            Family::Swap => vec!["free", "used", "total"],
            Family::Uptime => vec!["length"],
            Family::Load => vec!["one", "five", "fifteen"],
            Family::Network => std::iter::once("iface")
                .chain(NETWORK_COUNTERS)
                .collect(),
            Family::Disks => std::iter::once("device").chain(DISK_COUNTERS).collect(),
            Family::Mounts => vec!["mountpoint", "disk", "free", "total"],
        }
    }

    /// Returns true for families whose values are cumulative counters and
    /// must be turned into rates before emission.
    pub fn is_counter(self) -> bool {
        matches!(
            self,
            Family::Cpu | Family::Cpus | Family::Network | Family::Disks
        )
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Family::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| ConfigError::UnknownFamily(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_str() {
        assert_eq!("cpu".parse::<Family>().unwrap(), Family::Cpu);
        assert_eq!(" mounts ".parse::<Family>().unwrap(), Family::Mounts);
        assert_eq!(
            "gpu".parse::<Family>().unwrap_err(),
            ConfigError::UnknownFamily("gpu".into())
        );
    }

    #[test]
    fn test_family_names_round_trip() {
        for family in Family::ALL {
            assert_eq!(family.to_string().parse::<Family>().unwrap(), family);
        }
    }

    #[test]
    fn test_family_columns() {
        assert_eq!(Family::Network.columns().len(), 17);
        assert_eq!(Family::Network.columns()[0], "iface");
        assert_eq!(Family::Disks.columns().len(), 12);
        assert_eq!(Family::Cpu.columns(), Family::Cpus.columns());
    }

    #[test]
    fn test_counter_families() {
        let counters: Vec<_> = Family::ALL.into_iter().filter(|f| f.is_counter()).collect();
        assert_eq!(
            counters,
            [Family::Cpu, Family::Cpus, Family::Network, Family::Disks]
        );
    }
}
