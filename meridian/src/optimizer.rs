//! Cost and selectivity estimation feeding plan choice.

mod histogram;
mod stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use stats::{
    clear_table_stats, compute_statistics, get_table_stats, set_table_stats, TableStats,
    IO_COST_PER_PAGE,
};
