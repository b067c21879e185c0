//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a counter field, reading anything unparseable as zero.
fn counter<T: std::str::FromStr + Default>(field: Option<&&str>) -> T {
    field.and_then(|s| s.parse().ok()).unwrap_or_default()
}

// ============ /proc/stat ============

/// One `cpu` or `cpuN` line from `/proc/stat`, in clock ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStat {
    /// Line label: `cpu` for the aggregate, `cpuN` for core N.
    pub label: String,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Returns true for the aggregate line.
    pub fn is_aggregate(&self) -> bool {
        self.label == "cpu"
    }

    /// Sum of all tracked states. Guest time is already part of `user`.
    pub fn total(&self) -> u64 {
        [
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .into_iter()
        .fold(self.user, u64::saturating_add)
    }
}

/// Parses the `cpu*` lines of `/proc/stat`, in file order.
pub fn parse_cpu_stat(content: &str) -> Result<Vec<CpuStat>, ParseError> {
    let mut cpus = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(label) = parts.first() else {
            continue;
        };
        if !label.starts_with("cpu") {
            continue;
        }
        if parts.len() < 5 {
            return Err(ParseError::new(format!(
                "not enough fields for {}: expected 4+, got {}",
                label,
                parts.len() - 1
            )));
        }

        cpus.push(CpuStat {
            label: label.to_string(),
            user: counter(parts.get(1)),
            nice: counter(parts.get(2)),
            system: counter(parts.get(3)),
            idle: counter(parts.get(4)),
            iowait: counter(parts.get(5)),
            irq: counter(parts.get(6)),
            softirq: counter(parts.get(7)),
            steal: counter(parts.get(8)),
        });
    }

    Ok(cpus)
}

// ============ /proc/meminfo ============

/// Parsed data from `/proc/meminfo`, in kB.
///
/// Fields are `None` when the key is absent, so callers can tell a missing
/// source from a zero value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total: Option<u64>,
    pub mem_free: Option<u64>,
    pub buffers: Option<u64>,
    pub cached: Option<u64>,
    pub swap_total: Option<u64>,
    pub swap_free: Option<u64>,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut info.mem_total,
            "MemFree" => &mut info.mem_free,
            "Buffers" => &mut info.buffers,
            "Cached" => &mut info.cached,
            "SwapTotal" => &mut info.swap_total,
            "SwapFree" => &mut info.swap_free,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::new(format!("invalid value for {}", key.trim())))?;
        *slot = Some(value);
    }

    Ok(info)
}

// ============ /proc/uptime ============

/// Parses `/proc/uptime` and returns seconds since boot.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime"))
}

// ============ /proc/loadavg ============

/// Parsed data from `/proc/loadavg`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Parses `/proc/loadavg` content.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let parse = |idx: usize, name: &str| -> Result<f64, ParseError> {
        parts[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(LoadAvg {
        load1: parse(0, "load1")?,
        load5: parse(1, "load5")?,
        load15: parse(2, "load15")?,
    })
}

// ============ /proc/net/dev ============

/// Number of counters per interface in `/proc/net/dev`.
pub const NET_DEV_COUNTERS: usize = 16;

/// Parsed line of `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    /// Receive counters followed by transmit counters, in file order.
    /// Signed, so a reset counter diffs to a negative value.
    pub counters: [i64; NET_DEV_COUNTERS],
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
///
/// The first two lines are always a header.
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines().skip(2) {
        if line.trim().is_empty() {
            continue;
        }

        let (interface, values) = line
            .split_once(':')
            .ok_or_else(|| ParseError::new(format!("missing ':' in net/dev line {:?}", line)))?;
        let values: Vec<&str> = values.split_whitespace().collect();
        if values.len() < NET_DEV_COUNTERS {
            return Err(ParseError::new(format!(
                "not enough counters for {}: expected {}, got {}",
                interface.trim(),
                NET_DEV_COUNTERS,
                values.len()
            )));
        }

        let mut counters = [0; NET_DEV_COUNTERS];
        for (i, slot) in counters.iter_mut().enumerate() {
            *slot = counter(values.get(i));
        }

        devices.push(NetDevStats {
            interface: interface.trim().to_string(),
            counters,
        });
    }

    Ok(devices)
}

// ============ /proc/diskstats ============

/// Number of counters per device kept from `/proc/diskstats`.
pub const DISK_COUNTERS: usize = 11;

/// Parsed line of `/proc/diskstats`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskStats {
    /// Device name (sda, nvme0n1, etc.)
    pub device: String,
    /// reads, read merges, read sectors, read ticks, writes, write merges,
    /// write sectors, write ticks, in flight, io ticks, time in queue.
    /// Signed, since `in_flight` is a gauge that can go down.
    pub counters: [i64; DISK_COUNTERS],
}

/// Parses `/proc/diskstats` content.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged w_sectors w_time io_pending io_time w_io_time [discards ...]
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskStats>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 + DISK_COUNTERS {
            return Err(ParseError::new(format!(
                "not enough fields in diskstats: expected {}+, got {}",
                3 + DISK_COUNTERS,
                parts.len()
            )));
        }

        let mut counters = [0; DISK_COUNTERS];
        for (i, slot) in counters.iter_mut().enumerate() {
            *slot = counter(parts.get(3 + i));
        }

        disks.push(DiskStats {
            device: parts[2].to_string(),
            counters,
        });
    }

    Ok(disks)
}

// ============ /proc/mounts ============

/// Parsed line of `/proc/mounts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountEntry {
    /// Mounted device or pseudo source (`/dev/sda1`, `none`, `proc`).
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Parses `/proc/mounts` content.
///
/// Format: device mount_point fstype options dump pass
pub fn parse_mounts(content: &str) -> Result<Vec<MountEntry>, ParseError> {
    let mut mounts = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(ParseError::new(format!(
                "not enough fields in mounts: expected 3+, got {}",
                parts.len()
            )));
        }

        mounts.push(MountEntry {
            device: unescape_mount_field(parts[0]),
            mount_point: unescape_mount_field(parts[1]),
            fs_type: parts[2].to_string(),
        });
    }

    Ok(mounts)
}

/// Decodes the `\NNN` octal escapes the kernel uses for whitespace in paths.
fn unescape_mount_field(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && let Some(decoded) = decode_octal(&bytes[i + 1..i + 4])
        {
            out.push(decoded);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn decode_octal(digits: &[u8]) -> Option<u8> {
    let mut value: u32 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return None;
        }
        value = value * 8 + u32::from(d - b'0');
    }
    u8::try_from(value).ok()
}
