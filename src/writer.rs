use crate::model::{EventRecord, WriteOutcome, WriteSummary};
use crate::store::{EventStore, Filter};
use tracing::{info, warn};

pub const DEFAULT_TABLE: &str = "events";

pub struct DuplicateCheckedWriter<'a> {
    store: &'a mut dyn EventStore,
    table: String,
}

impl<'a> DuplicateCheckedWriter<'a> {
    pub fn new(store: &'a mut dyn EventStore, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }

    pub fn write(&mut self, record: &EventRecord) -> WriteOutcome {
        let key = record.identity_key();

        match self.store.find(&self.table, &Filter::identity(&key)) {
            Ok(existing) if !existing.is_empty() => {
                info!(event = %key, "skipped duplicate");
                return WriteOutcome::SkippedDuplicate;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(event = %key, error = %err, "duplicate check failed");
                return WriteOutcome::Failed(format!("duplicate check failed: {err}"));
            }
        }

        let row = match serde_json::to_value(record) {
            Ok(row) => row,
            Err(err) => return WriteOutcome::Failed(format!("record not serializable: {err}")),
        };

        match self.store.insert(&self.table, &row) {
            Ok(ack) if !ack.is_empty() => {
                info!(event = %key, "inserted");
                WriteOutcome::Inserted
            }
            Ok(_) => {
                warn!(event = %key, "insert returned no data");
                WriteOutcome::Failed("no data returned".to_string())
            }
            Err(err) => {
                warn!(event = %key, error = %err, "insert failed");
                WriteOutcome::Failed(format!("insert failed: {err}"))
            }
        }
    }

    pub fn write_all<'r, I>(&mut self, records: I) -> WriteSummary
    where
        I: IntoIterator<Item = &'r EventRecord>,
    {
        let mut summary = WriteSummary::default();
        for record in records {
            let outcome = self.write(record);
            summary.record(&outcome);
        }
        summary
    }
}
