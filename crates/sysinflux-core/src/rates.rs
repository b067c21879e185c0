//! Counter-to-rate normalization.
//!
//! Counter families (cpu, cpus, network, disks) report cumulative values.
//! [`RateNormalizer`] keeps the previous raw rows of every table it has seen
//! and turns each new sample into per-interval deltas scaled by the
//! consistency factor, so rates read the same whatever the sampling interval.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::table::{Table, Value};

// ---------------------------------------------------------------------------
// Delta arithmetic
// ---------------------------------------------------------------------------

/// Integer types that can be diffed and rescaled.
pub trait Counter: Copy {
    /// Returns `(self - prev) * factor` in this type.
    ///
    /// Subtraction wraps, so an unsigned counter that rolled over still
    /// yields the distance travelled. The scaled result saturates at the
    /// type's bounds.
    fn delta(self, prev: Self, factor: f64) -> Self;
}

macro_rules! impl_counter {
    ($($t:ty),*) => {
        $(
            impl Counter for $t {
                fn delta(self, prev: Self, factor: f64) -> Self {
                    (self.wrapping_sub(prev) as f64 * factor) as $t
                }
            }
        )*
    };
}

impl_counter!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Diffs two cells of the same integer width. Anything else passes through.
fn rate(current: &Value, prev: &Value, factor: f64) -> Value {
    match (current, prev) {
        (Value::I8(c), Value::I8(p)) => Value::I8(c.delta(*p, factor)),
        (Value::I16(c), Value::I16(p)) => Value::I16(c.delta(*p, factor)),
        (Value::I32(c), Value::I32(p)) => Value::I32(c.delta(*p, factor)),
        (Value::I64(c), Value::I64(p)) => Value::I64(c.delta(*p, factor)),
        (Value::U8(c), Value::U8(p)) => Value::U8(c.delta(*p, factor)),
        (Value::U16(c), Value::U16(p)) => Value::U16(c.delta(*p, factor)),
        (Value::U32(c), Value::U32(p)) => Value::U32(c.delta(*p, factor)),
        (Value::U64(c), Value::U64(p)) => Value::U64(c.delta(*p, factor)),
        _ => current.clone(),
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Outcome of normalizing one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Every cell had a baseline and now holds a rate.
    Complete(Table),
    /// At least one cell was seen for the first time. Those cells still hold
    /// their raw value, so the table must not be emitted.
    Incomplete(Table),
}

impl Normalized {
    pub fn is_complete(&self) -> bool {
        matches!(self, Normalized::Complete(_))
    }

    pub fn table(&self) -> &Table {
        match self {
            Normalized::Complete(t) | Normalized::Incomplete(t) => t,
        }
    }

    /// Returns the table if it is complete.
    pub fn complete(self) -> Option<Table> {
        match self {
            Normalized::Complete(t) => Some(t),
            Normalized::Incomplete(_) => None,
        }
    }
}

/// Raw snapshots of the previous lap, keyed by table name.
type Snapshots = HashMap<String, Vec<Vec<Value>>>;

/// Stateful delta engine shared by all sampling tasks.
///
/// Rows are matched to the previous lap by position. State lives for the
/// lifetime of the normalizer and is never persisted.
#[derive(Debug)]
pub struct RateNormalizer {
    factor: f64,
    snapshots: Mutex<Snapshots>,
}

impl RateNormalizer {
    /// Creates a normalizer that multiplies every delta by `factor`
    /// (consistency window divided by sampling interval).
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Replaces raw counters with scaled deltas against the previous sample
    /// of the same table, and records the new raw values.
    pub fn normalize(&self, mut table: Table) -> Normalized {
        let mut snapshots = self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = snapshots.entry(table.name.clone()).or_default();

        let mut new_cells = 0usize;
        for (i, row) in table.rows.iter_mut().enumerate() {
            if previous.len() <= i {
                previous.push(Vec::with_capacity(row.len()));
            }
            let prev_row = &mut previous[i];

            for (j, cell) in row.iter_mut().enumerate() {
                match prev_row.get_mut(j) {
                    Some(prev) => {
                        let raw = std::mem::replace(cell, Value::U64(0));
                        *cell = rate(&raw, prev, self.factor);
                        *prev = raw;
                    }
                    None => {
                        prev_row.push(cell.clone());
                        new_cells += 1;
                    }
                }
            }
        }

        if new_cells > 0 {
            debug!(table = %table.name, new_cells, "stored baseline");
            Normalized::Incomplete(table)
        } else {
            Normalized::Complete(table)
        }
    }

    /// Number of tables with a stored snapshot.
    pub fn tracked_tables(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_table(user: u64, total: u64) -> Table {
        let mut table = Table::new("web01.cpu", &["id", "user", "total"]);
        table
            .push_row(vec!["cpu".into(), Value::U64(user), Value::U64(total)])
            .unwrap();
        table
    }

    #[test]
    fn test_counter_delta_per_width() {
        assert_eq!(150u64.delta(100, 1.0), 50);
        assert_eq!(150u64.delta(100, 60.0), 3000);
        assert_eq!(10i32.delta(-5, 2.0), 30);
        assert_eq!((-3i64).delta(2, 1.0), -5);
        assert_eq!(5u16.delta(1, 0.5), 2);
    }

    #[test]
    fn test_counter_delta_truncates_at_narrow_width() {
        assert_eq!(200u8.delta(100, 4.0), u8::MAX);
        assert_eq!(100i8.delta(0, 2.0), i8::MAX);
        assert_eq!(0i8.delta(100, 2.0), i8::MIN);
    }

    #[test]
    fn test_counter_wraparound() {
        assert_eq!(5u32.delta(u32::MAX - 4, 1.0), 10);
        assert_eq!(1u8.delta(255, 1.0), 2);
    }

    #[test]
    fn test_rate_passthrough() {
        let text = Value::Text("eth0".into());
        assert_eq!(rate(&text, &Value::Text("eth1".into()), 2.0), text);
        assert_eq!(rate(&Value::F64(1.5), &Value::F64(0.5), 2.0), Value::F64(1.5));
        assert_eq!(rate(&Value::U32(10), &Value::U64(1), 2.0), Value::U32(10));
    }

    #[test]
    fn test_first_normalization_is_incomplete() {
        let normalizer = RateNormalizer::new(1.0);
        let result = normalizer.normalize(cpu_table(100, 1000));

        assert!(!result.is_complete());
        assert_eq!(result.table().get(0, "user"), Some(&Value::U64(100)));
        assert_eq!(normalizer.tracked_tables(), 1);
    }

    #[test]
    fn test_second_normalization_yields_rates() {
        let normalizer = RateNormalizer::new(1.0);
        normalizer.normalize(cpu_table(100, 1000));

        let result = normalizer.normalize(cpu_table(150, 1400));
        let table = result.complete().unwrap();
        assert_eq!(table.get(0, "id"), Some(&Value::Text("cpu".into())));
        assert_eq!(table.get(0, "user"), Some(&Value::U64(50)));
        assert_eq!(table.get(0, "total"), Some(&Value::U64(400)));
    }

    #[test]
    fn test_consistency_factor_scales_rates() {
        let normalizer = RateNormalizer::new(60.0);
        normalizer.normalize(cpu_table(0, 100));

        let table = normalizer.normalize(cpu_table(0, 150)).complete().unwrap();
        assert_eq!(table.get(0, "total"), Some(&Value::U64(3000)));
    }

    #[test]
    fn test_unchanged_counters_give_zero() {
        let normalizer = RateNormalizer::new(1.0);
        normalizer.normalize(cpu_table(100, 1000));
        normalizer.normalize(cpu_table(100, 1000));

        let table = normalizer.normalize(cpu_table(100, 1000)).complete().unwrap();
        assert_eq!(table.get(0, "user"), Some(&Value::U64(0)));
        assert_eq!(table.get(0, "total"), Some(&Value::U64(0)));
    }

    #[test]
    fn test_new_row_makes_table_incomplete() {
        let normalizer = RateNormalizer::new(1.0);
        let mut one = Table::new("web01.network", &["iface", "recv_bytes"]);
        one.push_row(vec!["eth0".into(), Value::U64(1000)]).unwrap();
        normalizer.normalize(one.clone());

        let mut two = Table::new("web01.network", &["iface", "recv_bytes"]);
        two.push_row(vec!["eth0".into(), Value::U64(1500)]).unwrap();
        two.push_row(vec!["eth1".into(), Value::U64(700)]).unwrap();

        let result = normalizer.normalize(two.clone());
        assert!(!result.is_complete());
        assert_eq!(result.table().get(0, "recv_bytes"), Some(&Value::U64(500)));
        assert_eq!(result.table().get(1, "recv_bytes"), Some(&Value::U64(700)));

        // Both rows now have baselines.
        two.rows[0][1] = Value::U64(1600);
        two.rows[1][1] = Value::U64(900);
        let table = normalizer.normalize(two).complete().unwrap();
        assert_eq!(table.get(0, "recv_bytes"), Some(&Value::U64(100)));
        assert_eq!(table.get(1, "recv_bytes"), Some(&Value::U64(200)));
    }

    #[test]
    fn test_snapshots_are_per_table_name() {
        let normalizer = RateNormalizer::new(1.0);
        normalizer.normalize(cpu_table(100, 1000));

        let mut other = cpu_table(100, 1000);
        other.name = "db01.cpu".into();
        assert!(!normalizer.normalize(other).is_complete());
        assert_eq!(normalizer.tracked_tables(), 2);
    }

    #[test]
    fn test_fewer_rows_keep_stale_snapshot() {
        let normalizer = RateNormalizer::new(1.0);
        let mut two = Table::new("web01.disks", &["device", "read_ios"]);
        two.push_row(vec!["sda".into(), Value::U64(10)]).unwrap();
        two.push_row(vec!["sdb".into(), Value::U64(20)]).unwrap();
        normalizer.normalize(two);

        let mut one = Table::new("web01.disks", &["device", "read_ios"]);
        one.push_row(vec!["sda".into(), Value::U64(15)]).unwrap();
        let table = normalizer.normalize(one).complete().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "read_ios"), Some(&Value::U64(5)));
    }

    #[test]
    fn test_concurrent_normalize_is_serialized() {
        use std::sync::Arc;

        let normalizer = Arc::new(RateNormalizer::new(1.0));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let normalizer = Arc::clone(&normalizer);
                std::thread::spawn(move || {
                    let mut table = cpu_table(0, 0);
                    table.name = format!("host{n}.cpu");
                    normalizer.normalize(table.clone());
                    normalizer.normalize(table).is_complete()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(normalizer.tracked_tables(), 8);
    }
}
