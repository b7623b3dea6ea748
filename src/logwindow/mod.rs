//! Time-window extraction from large log files.
//!
//! [`ReverseLineReader`] walks a file from its last line to its first so that
//! the recent end of a multi-gigabyte log can be windowed without reading
//! the rest. [`collect_reverse`] and [`collect_forward`] copy the lines of a
//! [`TimeWindow`] into a destination file; [`HostLogCollector`] adds the
//! logrotate awareness needed for the system log.

pub mod hostlog;
pub mod reverse;
pub mod timeparse;
pub mod window;

pub use hostlog::{find_system_log, HostLogCollector};
pub use reverse::{tail, ReverseLineReader, DEFAULT_CHUNK_SIZE};
pub use timeparse::{alertlog_time, runlog_time, syslog_time, LogFormat};
pub use window::{collect_forward, collect_reverse, LineTimeParser, TimeWindow};
