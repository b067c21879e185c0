//! One sampler per metric family.
//!
//! Each `sample_*` method reads a single `/proc` source through the
//! [`FileSystem`] abstraction and shapes it into a [`Table`] named
//! `<prefix><family>`. Samplers keep no state between calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use crate::collector::family::Family;
use crate::collector::procfs::{self, ParseError};
use crate::collector::traits::FileSystem;
use crate::table::{ShapeError, Table, Value};

/// Filesystem types that never describe real storage.
const IGNORED_FS_TYPES: &[&str] = &[
    "binfmt_misc",
    "cgroup",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "mqueue",
    "none",
    "proc",
    "rootfs",
    "securityfs",
    "sysfs",
    "rpc_pipefs",
    "fuse.gvfsd-fuse",
    "tmpfs",
];

/// `/proc/meminfo` reports kB.
const KIB: u64 = 1024;

/// Error type for a failed sample. Local to one family and one lap.
#[derive(Debug)]
pub enum SampleError {
    /// The source could not be read.
    Io(std::io::Error),
    /// The source was read but its content is malformed.
    Parse(ParseError),
    /// A row did not fit the family's columns.
    Shape(ShapeError),
    /// The read did not finish within the sample timeout.
    Timeout(Duration),
    /// The sampling task died before reporting.
    Aborted(String),
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Io(e) => write!(f, "I/O error: {}", e),
            SampleError::Parse(e) => write!(f, "{}", e),
            SampleError::Shape(e) => write!(f, "shape error: {}", e),
            SampleError::Timeout(d) => write!(f, "timed out after {:?}", d),
            SampleError::Aborted(msg) => write!(f, "sampling task aborted: {}", msg),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<std::io::Error> for SampleError {
    fn from(e: std::io::Error) -> Self {
        SampleError::Io(e)
    }
}

impl From<ParseError> for SampleError {
    fn from(e: ParseError) -> Self {
        SampleError::Parse(e)
    }
}

impl From<ShapeError> for SampleError {
    fn from(e: ShapeError) -> Self {
        SampleError::Shape(e)
    }
}

/// Reads host metrics from a proc filesystem.
pub struct Sampler<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    prefix: String,
}

impl<F: FileSystem> Sampler<F> {
    /// Creates a new sampler.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `prefix` - Prepended to every table name, e.g. `"web01."`
    pub fn new(fs: F, proc_path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            prefix: prefix.into(),
        }
    }

    /// Name of the table a family is emitted as.
    pub fn table_name(&self, family: Family) -> String {
        format!("{}{}", self.prefix, family.name())
    }

    /// Samples one family.
    pub fn sample(&self, family: Family) -> Result<Table, SampleError> {
        let table = match family {
            Family::Cpu => self.sample_cpu(family, true),
            Family::Cpus => self.sample_cpu(family, false),
            Family::Mem => self.sample_mem(),
            Family::Swap => self.sample_swap(),
            Family::Uptime => self.sample_uptime(),
            Family::Load => self.sample_load(),
            Family::Network => self.sample_network(),
            Family::Disks => self.sample_disks(),
            Family::Mounts => self.sample_mounts(),
        }?;
        trace!(family = %family, rows = table.len(), "sampled");
        Ok(table)
    }

    fn read(&self, file: &str) -> Result<String, SampleError> {
        Ok(self.fs.read_to_string(&self.proc_path.join(file))?)
    }

    fn empty_table(&self, family: Family) -> Table {
        Table::new(self.table_name(family), &family.columns())
    }

    // ============ cpu / cpus ============

    fn sample_cpu(&self, family: Family, aggregate: bool) -> Result<Table, SampleError> {
        let mut table = self.empty_table(family);
        for cpu in procfs::parse_cpu_stat(&self.read("stat")?)? {
            if cpu.is_aggregate() != aggregate {
                continue;
            }
            table.push_row(vec![
                Value::Text(cpu.label.clone()),
                cpu.user.into(),
                cpu.nice.into(),
                cpu.system.into(),
                cpu.idle.into(),
                cpu.iowait.into(),
                cpu.total().into(),
            ])?;
        }
        Ok(table)
    }

    // ============ mem / swap ============

    fn sample_mem(&self) -> Result<Table, SampleError> {
        let info = procfs::parse_meminfo(&self.read("meminfo")?)?;
        let field = |v: Option<u64>, key: &str| {
            v.map(|kb| kb * KIB)
                .ok_or_else(|| ParseError::new(format!("missing {} in meminfo", key)))
        };

        let total = field(info.mem_total, "MemTotal")?;
        let free = field(info.mem_free, "MemFree")?;
        let buffers = field(info.buffers, "Buffers")?;
        let cached = field(info.cached, "Cached")?;
        let used = total.saturating_sub(free);

        let mut table = self.empty_table(Family::Mem);
        table.push_row(vec![
            free.into(),
            used.into(),
            (free + buffers + cached).into(),
            used.saturating_sub(buffers + cached).into(),
            total.into(),
        ])?;
        Ok(table)
    }

    fn sample_swap(&self) -> Result<Table, SampleError> {
        let info = procfs::parse_meminfo(&self.read("meminfo")?)?;
        let (Some(total), Some(free)) = (info.swap_total, info.swap_free) else {
            return Err(ParseError::new("missing SwapTotal or SwapFree in meminfo").into());
        };

        let mut table = self.empty_table(Family::Swap);
        if total > 0 {
            let (total, free) = (total * KIB, free * KIB);
            table.push_row(vec![
                free.into(),
                total.saturating_sub(free).into(),
                total.into(),
            ])?;
        }
        Ok(table)
    }

    // ============ uptime / load ============

    fn sample_uptime(&self) -> Result<Table, SampleError> {
        let uptime = procfs::parse_uptime(&self.read("uptime")?)?;
        let mut table = self.empty_table(Family::Uptime);
        table.push_row(vec![uptime.into()])?;
        Ok(table)
    }

    fn sample_load(&self) -> Result<Table, SampleError> {
        let load = procfs::parse_loadavg(&self.read("loadavg")?)?;
        let mut table = self.empty_table(Family::Load);
        table.push_row(vec![load.load1.into(), load.load5.into(), load.load15.into()])?;
        Ok(table)
    }

    // ============ network / disks ============

    fn sample_network(&self) -> Result<Table, SampleError> {
        let mut table = self.empty_table(Family::Network);
        for dev in procfs::parse_net_dev(&self.read("net/dev")?)? {
            let mut row = Vec::with_capacity(1 + dev.counters.len());
            row.push(Value::Text(dev.interface));
            row.extend(dev.counters.into_iter().map(Value::I64));
            table.push_row(row)?;
        }
        Ok(table)
    }

    fn sample_disks(&self) -> Result<Table, SampleError> {
        let mut table = self.empty_table(Family::Disks);
        for disk in procfs::parse_diskstats(&self.read("diskstats")?)? {
            let mut row = Vec::with_capacity(1 + disk.counters.len());
            row.push(Value::Text(disk.device));
            row.extend(disk.counters.into_iter().map(Value::I64));
            table.push_row(row)?;
        }
        Ok(table)
    }

    // ============ mounts ============

    fn sample_mounts(&self) -> Result<Table, SampleError> {
        let mut table = self.empty_table(Family::Mounts);
        for mount in procfs::parse_mounts(&self.read("mounts")?)? {
            if mount.device == "none" || IGNORED_FS_TYPES.contains(&mount.fs_type.as_str()) {
                continue;
            }
            let stat = self.fs.statvfs(Path::new(&mount.mount_point))?;
            table.push_row(vec![
                Value::Text(mount.mount_point),
                Value::Text(mount.device),
                stat.free_bytes().into(),
                stat.total_bytes().into(),
            ])?;
        }
        Ok(table)
    }
}
