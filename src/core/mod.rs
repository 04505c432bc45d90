pub mod cycle;
pub mod report;
pub mod updater;

pub use cycle::{CycleRunner, CycleSummary, RefreshCycle};
pub use report::{ReportDispatcher, partition_recipients};
pub use updater::{CatalogUpdater, RetryPolicy, UpdateUnit};
