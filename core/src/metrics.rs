//! Metrics delegate (SPEC_FULL §5: ambient observability beyond logging):
//! a trait object a `DataStore` calls into around every operation, with a
//! no-op default so metrics are opt-in.

pub trait MetricsDelegate: Send + Sync {
    fn did_save(&self, _entity: &str, _count: usize, _elapsed: std::time::Duration) {}
    fn did_fail_save(&self, _entity: &str) {}
    fn did_fetch(&self, _entity: &str, _count: usize, _elapsed: std::time::Duration) {}
    fn did_fail_fetch(&self, _entity: &str) {}
    fn did_delete(&self, _entity: &str, _count: usize, _elapsed: std::time::Duration) {}
    fn did_fail_delete(&self, _entity: &str) {}
    fn did_execute_batch(&self, _insert_count: usize, _delete_count: usize, _elapsed: std::time::Duration) {}
    fn did_fail_execute_batch(&self) {}
    fn used_index_scan(&self, _entity: &str, _index_name: &str) {}
    fn used_table_scan(&self, _entity: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsDelegate for NoopMetrics {}
