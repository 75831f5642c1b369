use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::{match_all, WorkerInfo};
use crate::resolver::{resolve_name, BuildConfig};
use crate::stage::Stage;
use crate::substage::Substage;
use crate::timeline::Timeline;
use crate::timestamp::SplitTimestamp;

/// Epoch seconds of 2014-08-07T00:00:00Z. Logs of jobs started earlier
/// carry no timing tags.
pub const TIMING_TAGS_CUTOVER: i64 = 1_407_369_600;

const TAG_MARKER: &str = "travis_";
const WORKER_MARKER: &str = "Using worker:";
const COMMAND_PROMPT: &str = "$ ";

/// Jobs with an unknown start time are assumed to be recent enough.
pub fn timing_tags_supported(started_at: Option<DateTime<Utc>>) -> bool {
    match started_at {
        Some(started_at) => Utc
            .timestamp_opt(TIMING_TAGS_CUTOVER, 0)
            .single()
            .map_or(true, |cutover| started_at >= cutover),
        None => true,
    }
}

/// One build job: reads its log and collects the stages found in it.
#[derive(Debug, Clone, Default)]
pub struct BuildJob {
    job_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    build_config: BuildConfig,
    timeline: Timeline,
    worker: Option<WorkerInfo>,
    substage: Substage,
}

impl BuildJob {
    pub fn new(build_config: BuildConfig) -> Self {
        Self {
            build_config,
            ..Self::default()
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn worker(&self) -> Option<&WorkerInfo> {
        self.worker.as_ref()
    }

    pub fn has_timing_tags(&self) -> bool {
        timing_tags_supported(self.started_at)
    }

    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path.as_ref())?;
        self.process_stream(BufReader::new(file))
    }

    /// Reads the log line by line. Read errors are returned as is; the stages
    /// collected before the failure stay in the timeline.
    pub fn process_stream<R: BufRead>(&mut self, mut reader: R) -> Result<()> {
        let timing_enabled = self.has_timing_tags();
        if !timing_enabled {
            debug!(job_id = ?self.job_id, "job predates timing tags, skipping them");
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            self.process_line(&line, timing_enabled);
        }

        info!(
            job_id = ?self.job_id,
            stages = self.timeline.len(),
            duration = self.timeline.total_duration(),
            "job log processed"
        );
        Ok(())
    }

    pub fn process_line(&mut self, line: &str, timing_enabled: bool) {
        if timing_enabled && (line.contains(TAG_MARKER) || line.starts_with(COMMAND_PROMPT)) {
            self.process_tags(line);
        }

        if self.worker.is_none() && line.contains(WORKER_MARKER) {
            self.worker = WorkerInfo::parse_line(line);
        }
    }

    fn process_tags(&mut self, line: &str) {
        for (kind, tags) in match_all(line) {
            let applied = self.substage.process_parsed_tags(&tags);
            debug!(%kind, applied, "tag processed");

            if self.substage.has_finished() {
                self.finish_substage();
            }
        }
    }

    fn finish_substage(&mut self) {
        let mut substage = std::mem::take(&mut self.substage);

        if !substage.has_name() {
            if let Some(command) = substage.stage().command.clone() {
                let name = resolve_name(&command, &self.build_config);
                if !name.is_empty() {
                    substage.set_name(name);
                }
            }
        }

        if substage.finished_incomplete() {
            debug!(name = %substage.stage().name, "incomplete substage dropped");
            return;
        }

        self.timeline.add_stage(substage.into_stage());
    }

    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            recorded_at: Local::now(),
            job_id: self.job_id.clone(),
            started_at: self.timeline.started_at().cloned(),
            finished_at: self.timeline.finished_at().cloned(),
            duration: self.timeline.total_duration(),
            worker: self.worker.clone(),
            stages: self.timeline.stages().to_vec(),
        }
    }
}

/// Summary of a processed job, as handed to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub recorded_at: DateTime<Local>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<SplitTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<SplitTimestamp>,
    pub duration: f64,
    #[serde(default)]
    pub worker: Option<WorkerInfo>,
    pub stages: Vec<Stage>,
}

pub fn records_to_json(records: &[JobRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    const FOLD_START_INSTALL: &str = "travis_fold:start:install.4\r\x1b[0Ktravis_time:start:1a2b3c4d\r\x1b[0K$ pip install x\r\n";
    const TIMING_END_INSTALL: &str = "travis_time:end:1a2b3c4d:start=1408282815400000000,finish=1408282819050939474,duration=3650939474\r\x1b[0K\n";
    const FOLD_END_INSTALL: &str = "travis_fold:end:install.4\r\x1b[0K\n";

    fn run(job: &mut BuildJob, log: &str) {
        job.process_stream(Cursor::new(log.as_bytes().to_vec())).unwrap();
    }

    #[test]
    fn test_cutover() {
        let before = Utc.with_ymd_and_hms(2014, 8, 6, 23, 59, 59).unwrap();
        let at = Utc.with_ymd_and_hms(2014, 8, 7, 0, 0, 0).unwrap();
        assert!(!timing_tags_supported(Some(before)));
        assert!(timing_tags_supported(Some(at)));
        assert!(timing_tags_supported(None));
    }

    #[test]
    fn test_folded_timed_stage() {
        let log = format!(
            "{FOLD_START_INSTALL}Collecting x\r\nSuccessfully installed x\r\n{TIMING_END_INSTALL}{FOLD_END_INSTALL}"
        );
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, &log);

        let stages = job.timeline().stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "install.4");
        assert_eq!(stages[0].command.as_deref(), Some("pip install x"));
        assert!((stages[0].duration - 3.650939474).abs() < 1e-9);
        assert!(stages[0].started_at.is_some());
        assert!(stages[0].finished_at.is_some());
    }

    #[test]
    fn test_timing_end_and_fold_end_on_one_line() {
        let log = format!(
            "{FOLD_START_INSTALL}{}{FOLD_END_INSTALL}",
            TIMING_END_INSTALL.trim_end_matches('\n')
        );
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, &log);

        assert_eq!(job.timeline().len(), 1);
        assert_eq!(job.timeline().stages()[0].name, "install.4");
    }

    #[test]
    fn test_mismatched_hash_is_dropped_and_parsing_continues() {
        let log = "travis_time:start:aaaa1111\r\x1b[0K$ coveralls\r\n\
                   travis_time:end:bbbb2222:start=1408282815400000000,finish=1408282819050939474,duration=3650939474\r\x1b[0K\n\
                   travis_time:start:cccc3333\r\x1b[0K$ make test\r\n\
                   travis_time:end:cccc3333:start=1408282820000000000,finish=1408282822000000000,duration=2000000000\r\x1b[0K\n";
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, log);

        let stages = job.timeline().stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].command.as_deref(), Some("make test"));
        assert_eq!(stages[0].duration, 2.0);
    }

    #[test]
    fn test_bare_command_is_a_stage() {
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, "$ echo hello\r\nhello\r\n");

        let stages = job.timeline().stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "");
        assert_eq!(stages[0].command.as_deref(), Some("echo hello"));
        assert_eq!(stages[0].duration, 0.0);
    }

    #[test]
    fn test_bare_command_resolved_from_build_config() {
        let config = BuildConfig::new().with_stage("script", vec!["make", "echo hello"]);
        let mut job = BuildJob::new(config);
        run(&mut job, "$ echo hello\r\n");

        assert_eq!(job.timeline().stages()[0].name, "script.2");
    }

    #[test]
    fn test_timed_command_resolved_from_build_config() {
        let config = BuildConfig::new().with_stage("script", vec!["make test"]);
        let log = "travis_time:start:cccc3333\r\x1b[0K$ make test\r\n\
                   travis_time:end:cccc3333:start=1408282820000000000,finish=1408282822000000000,duration=2000000000\r\x1b[0K\n";
        let mut job = BuildJob::new(config);
        run(&mut job, log);

        assert_eq!(job.timeline().stages()[0].name, "script.1");
    }

    #[test]
    fn test_mismatched_fold_end_is_dropped() {
        let log = "travis_fold:start:git.1\r\x1b[0K$ git clone repo\r\n\
                   travis_fold:end:git.2\r\x1b[0K\n\
                   $ echo after\r\n";
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, log);

        let stages = job.timeline().stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].command.as_deref(), Some("echo after"));
    }

    #[test]
    fn test_fold_without_timing() {
        let log = "travis_fold:start:git.1\r\x1b[0K$ git clone repo\r\n\
                   Cloning into 'repo'...\r\n\
                   $ cd repo\r\n\
                   travis_fold:end:git.1\r\x1b[0K\n";
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, log);

        let stages = job.timeline().stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "git.1");
        assert_eq!(stages[0].command.as_deref(), Some("git clone repo"));
    }

    #[test]
    fn test_timeline_bounds_across_stages() {
        let log = "travis_time:start:aaaa1111\r\x1b[0K$ make deps\r\n\
                   travis_time:end:aaaa1111:start=100000000000,finish=105000000000,duration=5000000000\r\x1b[0K\n\
                   travis_time:start:bbbb2222\r\x1b[0K$ make test\r\n\
                   travis_time:end:bbbb2222:start=90000000000,finish=95000000000,duration=5000000000\r\x1b[0K\n";
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, log);

        let timeline = job.timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.started_at().unwrap().timestamp_seconds, 90.0);
        assert_eq!(timeline.finished_at().unwrap().timestamp_seconds, 105.0);
    }

    #[test]
    fn test_overflowing_finish_timestamp_files_no_stage() {
        let log = "travis_time:start:aaaa\r\x1b[0K$ make\r\n\
                   travis_time:end:aaaa:start=1,finish=99999999999999999999999,duration=5\r\x1b[0K\n";
        let mut job = BuildJob::new(BuildConfig::new());
        run(&mut job, log);

        assert!(job.timeline().is_empty());
    }

    #[test]
    fn test_old_job_skips_timing_tags() {
        let log = format!("{FOLD_START_INSTALL}{TIMING_END_INSTALL}{FOLD_END_INSTALL}$ echo hello\r\n");
        let started_at = Utc.with_ymd_and_hms(2014, 7, 1, 12, 0, 0).unwrap();
        let mut job = BuildJob::new(BuildConfig::new()).with_started_at(started_at);
        assert!(!job.has_timing_tags());

        run(&mut job, &log);
        assert!(job.timeline().is_empty());
    }

    #[test]
    fn test_worker_metadata() {
        let log = "Using worker: worker-linux-12-1.bb.travis-ci.org:travis-linux-11\r\n\
                   Using worker: other:os\r\n";
        let started_at = Utc.with_ymd_and_hms(2014, 7, 1, 12, 0, 0).unwrap();
        let mut job = BuildJob::new(BuildConfig::new()).with_started_at(started_at);
        run(&mut job, log);

        let worker = job.worker().unwrap();
        assert_eq!(worker.hostname, "worker-linux-12-1.bb.travis-ci.org");
        assert_eq!(worker.os, "travis-linux-11");
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let mut log = b"$ echo \xff\r\n".to_vec();
        log.extend_from_slice(b"$ echo ok\r\n");
        let mut job = BuildJob::new(BuildConfig::new());
        job.process_stream(Cursor::new(log)).unwrap();

        assert_eq!(job.timeline().len(), 2);
        assert_eq!(job.timeline().stages()[1].command.as_deref(), Some("echo ok"));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "stream closed"))
        }
    }

    #[test]
    fn test_read_error_keeps_collected_stages() {
        let reader = BufReader::new(Cursor::new(b"$ echo hello\r\n".to_vec()).chain(FailingReader));
        let mut job = BuildJob::new(BuildConfig::new());

        let result = job.process_stream(reader);
        assert!(matches!(result, Err(crate::error::BuildtimeError::Io(_))));
        assert_eq!(job.timeline().len(), 1);
    }

    #[test]
    fn test_process_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.log");
        std::fs::write(&path, format!("{FOLD_START_INSTALL}{TIMING_END_INSTALL}{FOLD_END_INSTALL}")).unwrap();

        let mut job = BuildJob::new(BuildConfig::new()).with_job_id("1234");
        job.process_file(&path).unwrap();

        let record = job.to_record();
        assert_eq!(record.job_id.as_deref(), Some("1234"));
        assert_eq!(record.stages.len(), 1);
        assert!((record.duration - 3.650939474).abs() < 1e-9);
        assert!(record.started_at.is_some());
    }

    #[test]
    fn test_records_to_json() {
        let mut job = BuildJob::new(BuildConfig::new()).with_job_id("42");
        run(&mut job, "$ echo hello\r\n");

        let json = records_to_json(&[job.to_record()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["job_id"], "42");
        assert_eq!(value[0]["stages"][0]["command"], "echo hello");
        assert!(value[0].get("started_at").is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut job = BuildJob::new(BuildConfig::new());
        assert!(job.process_file("/nonexistent/job.log").is_err());
    }
}
