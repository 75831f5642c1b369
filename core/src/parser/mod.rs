pub mod tags;
pub mod worker;

pub use tags::{match_all, match_line, TagFields, TagKind, TagPattern, TAG_PATTERNS};
pub use worker::WorkerInfo;
