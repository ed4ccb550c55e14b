use chrono::{DateTime, Utc};

/// One log line as received from the syslog listener.
///
/// Immutable once constructed; the aggregator queue owns it until it is
/// dequeued and turned into a [`crate::row::Row`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionRecord {
    /// Event time with sub-second precision.
    pub time: DateTime<Utc>,
    /// Canonical severity label (FATAL, ERROR, WARN, INFO, DEBUG).
    pub level: String,
    /// Application tag (RFC 5424 APP-NAME).
    pub tag: String,
    /// Process id as sent by the producer; not necessarily numeric.
    pub pid: String,
    /// Source host.
    pub hostname: String,
    /// Facility name (kern, user, ..., local7).
    pub facility: String,
    /// Raw message text.
    pub msg: String,
}

/// Maps a syslog severity code to a canonical level label.
pub fn severity_level(severity: u8) -> &'static str {
    match severity {
        0..=2 => "FATAL",
        3 => "ERROR",
        4 => "WARN",
        5 | 6 => "INFO",
        _ => "DEBUG",
    }
}

const FACILITIES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron", "security",
    "ftp", "ntp", "logaudit", "logalert", "clock", "local0", "local1", "local2", "local3",
    "local4", "local5", "local6", "local7",
];

/// Maps a syslog facility code to its name. Unknown codes map to "".
pub fn facility_name(facility: u8) -> &'static str {
    FACILITIES.get(facility as usize).copied().unwrap_or("")
}
