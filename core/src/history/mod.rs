pub mod storage;

use std::path::PathBuf;

use crate::job::JobRecord;

/// Destination for processed jobs.
pub trait StageSink {
    fn store(&mut self, record: JobRecord) -> anyhow::Result<()>;
}

/// Bounded job store backed by a JSON file. The oldest records are dropped
/// once `max_jobs` is exceeded.
pub struct JobHistory {
    records: Vec<JobRecord>,
    storage_path: PathBuf,
    max_jobs: usize,
}

impl JobHistory {
    pub fn new(storage_path: PathBuf, max_jobs: usize) -> anyhow::Result<Self> {
        let records = storage::load_records(&storage_path)?;
        Ok(Self {
            records,
            storage_path,
            max_jobs,
        })
    }

    pub fn add_record(&mut self, record: JobRecord) -> anyhow::Result<()> {
        self.records.push(record);

        if self.records.len() > self.max_jobs {
            let excess = self.records.len() - self.max_jobs;
            self.records.drain(..excess);
        }

        storage::save_records(&self.storage_path, &self.records)
    }

    pub fn entries(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn last_entry(&self) -> Option<&JobRecord> {
        self.records.last()
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.records.clear();
        storage::save_records(&self.storage_path, &self.records)
    }
}

impl StageSink for JobHistory {
    fn store(&mut self, record: JobRecord) -> anyhow::Result<()> {
        self.add_record(record)
    }
}
