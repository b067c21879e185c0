//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` filesystem states
//! for testing various system conditions.

use super::filesystem::MockFs;
use crate::collector::traits::FsStat;

impl MockFs {
    /// Creates a typical 4-core host with swap, two interfaces, two disks
    /// and a handful of real and pseudo mounts.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        3072000 kB
Dirty:              1024 kB
",
        );
        fs.add_file(
            "/proc/mounts",
            "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
devtmpfs /dev devtmpfs rw,nosuid,size=8192000k 0 0
tmpfs /run tmpfs rw,nosuid,nodev,mode=755 0 0
none /sys/fs/bpf bpf rw,nosuid,nodev,noexec 0 0
/dev/sdb1 /mnt/backup\\040disk xfs rw,relatime 0 0
",
        );
        fs.add_mount(
            "/",
            FsStat {
                block_size: 4096,
                blocks: 25_000_000,
                blocks_free: 10_000_000,
            },
        );
        fs.add_mount(
            "/mnt/backup disk",
            FsStat {
                block_size: 4096,
                blocks: 50_000_000,
                blocks_free: 45_000_000,
            },
        );

        fs.advance_counters(0);
        fs
    }

    /// Typical system without any swap configured.
    pub fn without_swap() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapTotal:             0 kB
SwapFree:              0 kB
",
        );
        fs
    }

    /// Typical system whose kernel does not report swap keys at all, so the
    /// swap family cannot be sampled while mem still can.
    pub fn swap_unreadable() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
Buffers:          512000 kB
Cached:          2048000 kB
",
        );
        fs
    }

    /// Rewrites the counter sources as they would read `lap` intervals after
    /// `typical_system()`.
    ///
    /// Per lap: aggregate cpu advances 100 user, 300 idle (total 400), each
    /// core a quarter of that; eth0 receives 1000 bytes and lo 500; sda reads
    /// 10 requests and nvme0n1 writes 20.
    pub fn advance_counters(&mut self, lap: u64) {
        let cpu = |label: &str, share: u64| {
            format!(
                "{} {} 500 3000 {} 1000 200 100 0 0 0\n",
                label,
                (10_000 + 100 * lap) / share,
                (80_000 + 300 * lap) / share,
            )
        };
        let mut stat = cpu("cpu ", 1);
        for n in 0..4 {
            stat.push_str(&cpu(&format!("cpu{n}"), 4));
        }
        stat.push_str("intr 1000000 50 0 0 0\nctxt 500000\nbtime 1700000000\nprocesses 10000\n");
        self.add_file("/proc/stat", stat);

        self.add_file(
            "/proc/net/dev",
            format!(
                "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: {}     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
  eth0: {}     5678    1    2    0     0          0        10 87654321     4321    3    4    0     0       0          0
",
                1_234_567 + 500 * lap,
                9_876_543 + 1000 * lap,
            ),
        );

        self.add_file(
            "/proc/diskstats",
            format!(
                "\
   8       0 sda {} 0 56789 100 5678 0 98765 200 0 150 300 0 0 0 0
 259       0 nvme0n1 9999 0 123456 500 {} 0 654321 400 5 1000 2000 0 0 0 0
",
                1234 + 10 * lap,
                8888 + 20 * lap,
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::procfs::{parse_cpu_stat, parse_meminfo, parse_net_dev};
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn test_typical_system_is_parseable() {
        let fs = MockFs::typical_system();

        let stat = fs.read_to_string(Path::new("/proc/stat")).unwrap();
        let cpus = parse_cpu_stat(&stat).unwrap();
        assert_eq!(cpus.len(), 5);

        let net = fs.read_to_string(Path::new("/proc/net/dev")).unwrap();
        assert_eq!(parse_net_dev(&net).unwrap().len(), 2);
    }

    #[test]
    fn test_advance_counters_moves_totals() {
        let mut fs = MockFs::typical_system();
        let before = parse_cpu_stat(&fs.read_to_string(Path::new("/proc/stat")).unwrap()).unwrap();
        fs.advance_counters(1);
        let after = parse_cpu_stat(&fs.read_to_string(Path::new("/proc/stat")).unwrap()).unwrap();

        assert_eq!(after[0].total() - before[0].total(), 400);
        assert_eq!(after[1].total() - before[1].total(), 100);
    }

    #[test]
    fn test_swap_variants() {
        let info = parse_meminfo(
            &MockFs::without_swap()
                .read_to_string(Path::new("/proc/meminfo"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(info.swap_total, Some(0));

        let info = parse_meminfo(
            &MockFs::swap_unreadable()
                .read_to_string(Path::new("/proc/meminfo"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(info.swap_total, None);
        assert!(info.mem_total.is_some());
    }
}
