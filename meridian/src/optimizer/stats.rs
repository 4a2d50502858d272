//! Per-table statistics and the process-wide statistics registry.

use super::histogram::{IntHistogram, StringHistogram};
use crate::errors::ExecutionError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use substrate::{BufferPool, DbFile, Field, Op, TransactionId, Type};

/// Cost charged per page read; pages are atomic read units, so a page
/// holding one tuple costs the same as a full one.
pub const IO_COST_PER_PAGE: usize = 1000;

const HIST_BUCKETS: usize = 10;
const INT_HIST_MIN: i32 = 0;
const INT_HIST_MAX: i32 = 32;

enum ColumnHistogram {
    Int(IntHistogram),
    Str(StringHistogram),
}

/// Statistics about one base table: scan cost, cardinality, and one
/// histogram per column the estimator understands.
pub struct TableStats {
    scan_cost: f64,
    tuple_count: usize,
    histograms: Vec<Option<ColumnHistogram>>,
}

impl TableStats {
    /// Scans the table once under a fresh transaction, filling one
    /// histogram per column. The scan transaction commits at the end
    /// so its read locks drain.
    pub fn new(
        pool: &Arc<BufferPool>,
        table_id: u32,
        io_cost_per_page: usize,
    ) -> Result<Self, ExecutionError> {
        let file = pool.catalog().db_file(table_id)?;
        let desc = file.tuple_desc().clone();

        let mut histograms: Vec<Option<ColumnHistogram>> = (0..desc.num_fields())
            .map(|i| match desc.field_type(i) {
                Type::Int => Some(ColumnHistogram::Int(IntHistogram::new(
                    HIST_BUCKETS,
                    INT_HIST_MIN,
                    INT_HIST_MAX,
                ))),
                Type::String => Some(ColumnHistogram::Str(StringHistogram::new(HIST_BUCKETS))),
                Type::Double => None,
            })
            .collect();

        let scan_cost = (io_cost_per_page * file.num_pages()) as f64;
        let mut tuple_count = 0;

        let tid = TransactionId::new();
        let mut scan = file.scan(Arc::clone(pool), tid);
        while let Some(tuple) = scan.next()? {
            for (i, histogram) in histograms.iter_mut().enumerate() {
                match (histogram, tuple.field(i)) {
                    (Some(ColumnHistogram::Int(h)), Field::Int(v)) => h.add_value(*v),
                    (Some(ColumnHistogram::Str(h)), Field::Str(s)) => h.add_value(s),
                    _ => {}
                }
            }
            tuple_count += 1;
        }
        pool.transaction_complete(tid, true)?;

        Ok(Self {
            scan_cost,
            tuple_count,
            histograms,
        })
    }

    /// Cost of a full sequential scan, assuming a cold buffer pool.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.scan_cost
    }

    /// Rows surviving a predicate of the given selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.tuple_count as f64 * selectivity) as usize
    }

    /// Selectivity of `column op constant`, routed to the column's
    /// histogram by the constant's type. Columns without a histogram
    /// estimate 1.0.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Field) -> f64 {
        match (&self.histograms[field], constant) {
            (Some(ColumnHistogram::Int(h)), Field::Int(v)) => h.estimate_selectivity(op, *v),
            (Some(ColumnHistogram::Str(h)), Field::Str(s)) => h.estimate_selectivity(op, s),
            _ => 1.0,
        }
    }

    pub fn total_tuples(&self) -> usize {
        self.tuple_count
    }
}

/// The registry is the one piece of process-wide state: a lazily
/// initialized map from table name to its statistics.
fn registry() -> &'static Mutex<HashMap<String, Arc<TableStats>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<TableStats>>>> = OnceLock::new();
    REGISTRY.get_or_init(Mutex::default)
}

pub fn get_table_stats(table_name: &str) -> Option<Arc<TableStats>> {
    registry().lock().unwrap().get(table_name).cloned()
}

/// Sets or replaces the statistics for a table.
pub fn set_table_stats(table_name: &str, stats: Arc<TableStats>) {
    registry()
        .lock()
        .unwrap()
        .insert(table_name.to_string(), stats);
}

pub fn clear_table_stats() {
    registry().lock().unwrap().clear();
}

/// Builds statistics for every table in the catalog.
pub fn compute_statistics(pool: &Arc<BufferPool>) -> Result<(), ExecutionError> {
    crate::meridian_debug_log!("[compute_statistics] Computing table stats.");
    for table_id in pool.catalog().table_ids() {
        let stats = TableStats::new(pool, table_id, IO_COST_PER_PAGE)?;
        let name = pool.catalog().table_name(table_id)?;
        set_table_stats(&name, Arc::new(stats));
    }
    crate::meridian_debug_log!("[compute_statistics] Done.");
    Ok(())
}
