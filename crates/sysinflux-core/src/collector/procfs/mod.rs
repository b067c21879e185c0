//! Parsers for the Linux `/proc` filesystem.
//!
//! Everything here works on file contents already read into memory, so it
//! can be tested with plain string fixtures.

pub mod parser;

pub use parser::{
    CpuStat, DiskStats, LoadAvg, MemInfo, MountEntry, NetDevStats, ParseError, parse_cpu_stat,
    parse_diskstats, parse_loadavg, parse_meminfo, parse_mounts, parse_net_dev, parse_uptime,
};
