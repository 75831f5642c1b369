pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod job;
pub mod logger;
pub mod parser;
pub mod resolver;
pub mod stage;
pub mod substage;
pub mod timeline;
pub mod timestamp;

pub use cli::{Cli, Commands, HistoryCommands};
pub use config::Config;
pub use error::{BuildtimeError, Result};
pub use history::{JobHistory, StageSink};
pub use job::{records_to_json, timing_tags_supported, BuildJob, JobRecord, TIMING_TAGS_CUTOVER};
pub use logger::{LogLevel, Logger};
pub use parser::{TagFields, TagKind, WorkerInfo};
pub use resolver::{resolve_name, BuildConfig};
pub use stage::Stage;
pub use substage::{Substage, SubstageState};
pub use timeline::Timeline;
pub use timestamp::SplitTimestamp;
