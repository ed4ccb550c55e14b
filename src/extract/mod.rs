//! Field extraction from free-text log messages.
//!
//! A message may be a whole JSON object, or text carrying up to two embedded
//! JSON fragments (a vendor ` c{...}` suffix and a generic `{...}` span), and
//! may start with a bracketed process header. Extraction never fails: any
//! part that does not decode is left in the message text as-is.

pub mod header;
pub mod level;
pub mod value;

use crate::partition::PartitionScheme;
use crate::record::IngestionRecord;
use crate::row::{Fields, Row};

use self::header::parse_header;
use self::level::json_level;
use self::value::{decode_object, FieldValue, JsonObject};

/// Turns ingestion records into store-ready rows.
#[derive(Debug, Clone)]
pub struct Extractor {
    scheme: PartitionScheme,
}

impl Extractor {
    /// Creates an extractor that assigns partition keys with `scheme`.
    pub fn new(scheme: PartitionScheme) -> Self {
        Self { scheme }
    }

    /// Extracts a row from one record.
    pub fn extract(&self, record: &IngestionRecord) -> Row {
        let (mut text, objects) = split_json(&record.msg);

        let mut row = Row {
            partition: self.scheme.key(&record.time),
            time: record.time,
            host: record.hostname.clone(),
            level: record.level.clone(),
            tag: record.tag.clone(),
            pid: record.pid.clone(),
            caller: String::new(),
            msg: String::new(),
            string_fields: Fields::new(),
            number_fields: Fields::new(),
            boolean_fields: Fields::new(),
            null_fields: Vec::new(),
            phone: 0,
            request_id: String::new(),
            order_id: String::new(),
            subscription_id: String::new(),
        };

        if let Some(header) = parse_header(&text) {
            row.pid = header.pid.to_string();
            row.caller = header.caller.to_string();
            if let Some(level) = header.level {
                row.level = level.to_string();
            }
            text = header.rest.to_string();
        }
        row.msg = text;

        for object in &objects {
            let has_request_id = object.iter().any(|(k, _)| k == "request_id");
            let has_id = object.iter().any(|(k, _)| k == "id");

            for (key, value) in object {
                if !promote(&mut row, key, value, has_request_id, has_id) {
                    classify(&mut row, key, value);
                }
            }
        }

        row
    }
}

/// Splits decodable JSON out of `msg`, returning the residual text and the
/// decoded objects in the order they were found.
fn split_json(msg: &str) -> (String, Vec<JsonObject>) {
    let mut objects = Vec::new();

    let trimmed = msg.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Some(object) = decode_object(trimmed) {
            objects.push(object);
            return (String::new(), objects);
        }
        return (msg.to_string(), objects);
    }

    if !msg.contains('{') {
        return (msg.to_string(), objects);
    }

    let mut text = msg.to_string();

    if text.ends_with('}') {
        if let Some(from) = text.find(" c{") {
            if let Some(object) = decode_object(&text[from + 2..]) {
                objects.push(object);
                text.truncate(from);
            }
        }
    }

    if let (Some(from), Some(to)) = (text.find('{'), text.rfind('}')) {
        if from < to {
            if let Some(object) = decode_object(&text[from..=to]) {
                objects.push(object);
                let start = if from > 0 && text.as_bytes()[from - 1] == b'j' {
                    from - 1
                } else {
                    from
                };
                text.replace_range(start..=to, "");
            }
        }
    }

    (text, objects)
}

/// Moves a business field into its dedicated column. Returns false if the
/// pair was not consumed and belongs in the generic arrays.
fn promote(row: &mut Row, key: &str, value: &FieldValue, has_request_id: bool, has_id: bool) -> bool {
    match (key, value) {
        ("phone", value) => {
            if let Some(phone) = phone_number(value) {
                row.phone = phone;
            }
        }
        ("request_id", FieldValue::String(s)) => row.request_id = s.clone(),
        ("id", FieldValue::String(s)) if !has_request_id => row.request_id = s.clone(),
        ("msg_id", FieldValue::String(s)) if !has_request_id && !has_id => {
            row.request_id = s.clone();
        }
        ("order_id", FieldValue::String(s)) => row.order_id = s.clone(),
        ("subscription_id", FieldValue::String(s)) => row.subscription_id = s.clone(),
        ("level", FieldValue::String(s)) => row.level = json_level(s).to_string(),
        ("tag", FieldValue::String(s)) => row.tag = s.clone(),
        ("pid", FieldValue::String(s)) => row.pid = s.clone(),
        ("pid", FieldValue::Number(n)) => row.pid = n.as_str().to_string(),
        ("caller", FieldValue::String(s)) => row.caller = s.clone(),
        _ => return false,
    }
    true
}

fn phone_number(value: &FieldValue) -> Option<u64> {
    match value {
        FieldValue::String(s) => s.parse().ok(),
        FieldValue::Number(n) => n.as_str().parse().ok(),
        _ => None,
    }
}

/// Files a field into the array matching its runtime type.
fn classify(row: &mut Row, key: &str, value: &FieldValue) {
    match value {
        FieldValue::String(s) => row.string_fields.push(key, s.clone()),
        FieldValue::Bool(b) => row.boolean_fields.push(key, u8::from(*b)),
        FieldValue::Number(n) => {
            if let Some(v) = n.to_f64() {
                row.number_fields.push(key, v);
            }
        }
        FieldValue::Null => row.null_fields.push(key.to_string()),
        FieldValue::Composite(json) => row.string_fields.push(key, json.clone()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::partition::Granularity;

    fn extractor() -> Extractor {
        Extractor::new(PartitionScheme::new(Granularity::Hourly, "%Y%m%d%H").expect("valid format"))
    }

    fn record(msg: &str) -> IngestionRecord {
        IngestionRecord {
            time: Utc
                .with_ymd_and_hms(2024, 5, 1, 13, 45, 0)
                .single()
                .expect("valid time"),
            level: "INFO".to_string(),
            tag: "app".to_string(),
            pid: "100".to_string(),
            hostname: "host-a".to_string(),
            facility: "local0".to_string(),
            msg: msg.to_string(),
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        let row = extractor().extract(&record("just a line"));
        assert_eq!(row.msg, "just a line");
        assert_eq!(row.level, "INFO");
        assert_eq!(row.tag, "app");
        assert_eq!(row.pid, "100");
        assert_eq!(row.caller, "");
        assert_eq!(row.host, "host-a");
        assert_eq!(row.partition, "2024050113");
        assert!(row.string_fields.is_empty());
        assert!(row.number_fields.is_empty());
        assert!(row.boolean_fields.is_empty());
        assert!(row.null_fields.is_empty());
        assert_eq!(row.phone, 0);
        assert_eq!(row.request_id, "");
    }

    #[test]
    fn test_whole_message_json() {
        let row = extractor().extract(&record(
            r#"{"level":"ERROR","request_id":"abc","n":3.5,"flag":true,"k":null}"#,
        ));
        assert_eq!(row.level, "ERROR");
        assert_eq!(row.request_id, "abc");
        assert_eq!(row.msg, "");
        assert_eq!(row.number_fields.get("n"), Some(&3.5));
        assert_eq!(row.boolean_fields.get("flag"), Some(&1));
        assert_eq!(row.null_fields, vec!["k".to_string()]);
        assert!(row.string_fields.is_empty());
    }

    #[test]
    fn test_whole_message_json_with_surrounding_spaces() {
        let row = extractor().extract(&record(r#"  {"a":"b"}  "#));
        assert_eq!(row.msg, "");
        assert_eq!(row.string_fields.get("a"), Some(&"b".to_string()));
    }

    #[test]
    fn test_malformed_whole_json_is_opaque() {
        // Embedded forms are not tried once the whole-message form fails.
        let row = extractor().extract(&record(r#"{"a": {"b": 1} } x}"#));
        assert_eq!(row.msg, r#"{"a": {"b": 1} } x}"#);
        assert!(row.number_fields.is_empty());

        let row = extractor().extract(&record(r#"{"a":1,}"#));
        assert_eq!(row.msg, r#"{"a":1,}"#);
        assert!(row.number_fields.is_empty());
    }

    #[test]
    fn test_request_id_priority() {
        let row = extractor().extract(&record(r#"{"id":"x1","request_id":"r1"}"#));
        assert_eq!(row.request_id, "r1");
        // The unused id stays a generic field.
        assert_eq!(row.string_fields.get("id"), Some(&"x1".to_string()));

        let row = extractor().extract(&record(r#"{"id":"x1"}"#));
        assert_eq!(row.request_id, "x1");
        assert!(row.string_fields.is_empty());

        let row = extractor().extract(&record(r#"{"msg_id":"m1","id":"x1"}"#));
        assert_eq!(row.request_id, "x1");
        assert_eq!(row.string_fields.get("msg_id"), Some(&"m1".to_string()));

        let row = extractor().extract(&record(r#"{"msg_id":"m1"}"#));
        assert_eq!(row.request_id, "m1");
    }

    #[test]
    fn test_embedded_generic_json_with_marker() {
        let row = extractor().extract(&record(r#"prefix j{"a":1} suffix"#));
        assert_eq!(row.msg, "prefix  suffix");
        assert_eq!(row.number_fields.get("a"), Some(&1.0));
    }

    #[test]
    fn test_embedded_generic_json_without_marker() {
        let row = extractor().extract(&record(r#"got {"user":"bob"} ok"#));
        assert_eq!(row.msg, "got  ok");
        assert_eq!(row.string_fields.get("user"), Some(&"bob".to_string()));
    }

    #[test]
    fn test_embedded_json_at_start_of_text() {
        let row = extractor().extract(&record(r#"{"a":true} trailing"#));
        assert_eq!(row.msg, " trailing");
        assert_eq!(row.boolean_fields.get("a"), Some(&1));
    }

    #[test]
    fn test_vendor_bracket_form() {
        let row = extractor().extract(&record(r#"payment done c{"order_id":"o-9"}"#));
        assert_eq!(row.msg, "payment done");
        assert_eq!(row.order_id, "o-9");
    }

    #[test]
    fn test_vendor_and_generic_forms_together() {
        let row = extractor().extract(&record(
            r#"start j{"subscription_id":"s-1"} mid c{"order_id":"o-2","ok":false}"#,
        ));
        assert_eq!(row.msg, "start  mid");
        assert_eq!(row.order_id, "o-2");
        assert_eq!(row.subscription_id, "s-1");
        assert_eq!(row.boolean_fields.get("ok"), Some(&0));
    }

    #[test]
    fn test_undecodable_fragment_is_left_in_text() {
        let row = extractor().extract(&record("value {not json} here"));
        assert_eq!(row.msg, "value {not json} here");
        assert!(row.string_fields.is_empty());
    }

    #[test]
    fn test_closing_brace_before_opening_is_ignored() {
        let row = extractor().extract(&record("a } b { c"));
        assert_eq!(row.msg, "a } b { c");
    }

    #[test]
    fn test_bracket_header() {
        let row = extractor().extract(&record("[1234 mymodule.go:10] INFO started up"));
        assert_eq!(row.pid, "1234");
        assert_eq!(row.caller, "mymodule.go:10");
        assert_eq!(row.level, "INFO");
        assert_eq!(row.msg, "started up");
    }

    #[test]
    fn test_bracket_header_with_embedded_json_override() {
        let row = extractor().extract(&record(
            r#"[2024-05-01 55 worker.go:7] WARN retry j{"pid":77,"caller":"other.go:1","attempt":2}"#,
        ));
        assert_eq!(row.level, "ERROR");
        assert_eq!(row.pid, "77");
        assert_eq!(row.caller, "other.go:1");
        assert_eq!(row.msg, "retry ");
        assert_eq!(row.number_fields.get("attempt"), Some(&2.0));
    }

    #[test]
    fn test_bracket_header_with_non_numeric_pid_is_text() {
        let row = extractor().extract(&record("[abc main.go:1] INFO x"));
        assert_eq!(row.msg, "[abc main.go:1] INFO x");
        assert_eq!(row.pid, "100");
        assert_eq!(row.level, "INFO");
    }

    #[test]
    fn test_phone_promotion() {
        let row = extractor().extract(&record(r#"{"phone":"79001234567"}"#));
        assert_eq!(row.phone, 79_001_234_567);

        let row = extractor().extract(&record(r#"{"phone":79001234567}"#));
        assert_eq!(row.phone, 79_001_234_567);

        let row = extractor().extract(&record(r#"{"phone":"n/a"}"#));
        assert_eq!(row.phone, 0);
        assert!(row.string_fields.is_empty());

        let row = extractor().extract(&record(r#"{"phone":1.5}"#));
        assert_eq!(row.phone, 0);
        assert!(row.number_fields.is_empty());
    }

    #[test]
    fn test_json_level_normalization() {
        let row = extractor().extract(&record(r#"{"level":"PANIC"}"#));
        assert_eq!(row.level, "FATAL");
        let row = extractor().extract(&record(r#"{"level":"TRACE"}"#));
        assert_eq!(row.level, "DEBUG");
        let row = extractor().extract(&record(r#"{"level":"notice"}"#));
        assert_eq!(row.level, "DEBUG");
    }

    #[test]
    fn test_metadata_overrides() {
        let row = extractor().extract(&record(r#"{"tag":"billing","pid":"9"}"#));
        assert_eq!(row.tag, "billing");
        assert_eq!(row.pid, "9");
    }

    #[test]
    fn test_wrong_typed_promoted_field_is_generic() {
        let row = extractor().extract(&record(r#"{"request_id":42,"tag":false}"#));
        assert_eq!(row.request_id, "");
        assert_eq!(row.tag, "app");
        assert_eq!(row.number_fields.get("request_id"), Some(&42.0));
        assert_eq!(row.boolean_fields.get("tag"), Some(&0));
    }

    #[test]
    fn test_generic_classification() {
        let row = extractor().extract(&record(
            r#"{"s":"x","i":7,"f":2.25,"b":false,"z":null,"o":{"k":[1,2]},"big":1e5}"#,
        ));
        assert_eq!(row.string_fields.get("s"), Some(&"x".to_string()));
        assert_eq!(row.string_fields.get("o"), Some(&r#"{"k":[1,2]}"#.to_string()));
        assert_eq!(row.number_fields.get("i"), Some(&7.0));
        assert_eq!(row.number_fields.get("f"), Some(&2.25));
        assert_eq!(row.number_fields.get("big"), None);
        assert_eq!(row.boolean_fields.get("b"), Some(&0));
        assert_eq!(row.null_fields, vec!["z".to_string()]);
        assert_eq!(row.string_fields.names().len(), row.string_fields.values().len());
        assert_eq!(row.number_fields.names().len(), row.number_fields.values().len());
    }

    #[test]
    fn test_later_object_overwrites_promoted_scalars() {
        let row = extractor().extract(&record(
            r#"a j{"request_id":"first"} b c{"request_id":"second"}"#,
        ));
        // The vendor form is decoded first, the generic form second.
        assert_eq!(row.request_id, "first");
    }

    #[test]
    fn test_empty_message() {
        let row = extractor().extract(&record(""));
        assert_eq!(row.msg, "");
        assert!(row.string_fields.is_empty());
    }
}
