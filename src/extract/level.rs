/// Normalizes a level label found after a bracketed process header.
/// WARN maps to ERROR.
pub fn header_level(label: &str) -> &'static str {
    match label {
        "EMERG" | "ALERT" | "CRIT" => "FATAL",
        "ERR" | "WARN" => "ERROR",
        "NOTICE" => "INFO",
        "INFO" => "INFO",
        "DEBUG" | "TRACE" => "DEBUG",
        _ => "DEBUG",
    }
}

/// Normalizes a `level` value found in an embedded JSON object.
pub fn json_level(label: &str) -> &'static str {
    match label {
        "DEBUG" => "DEBUG",
        "INFO" => "INFO",
        "WARN" => "WARN",
        "ERROR" => "ERROR",
        "FATAL" | "PANIC" => "FATAL",
        "TRACE" => "DEBUG",
        _ => "DEBUG",
    }
}
