pub mod perf;
pub mod time;

pub use perf::Stopwatch;
pub use time::{convert_to_seconds, format_duration, parse_seek_position, seconds_to_hhmmss};
