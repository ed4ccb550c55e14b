use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Insert column order shared by every insert template.
pub const INSERT_COLUMNS: [&str; 20] = [
    "date",
    "timestamp",
    "nsec",
    "host",
    "level",
    "tag",
    "pid",
    "caller",
    "msg",
    "string_fields.names",
    "string_fields.values",
    "number_fields.names",
    "number_fields.values",
    "boolean_fields.names",
    "boolean_fields.values",
    "null_fields.names",
    "phone",
    "request_id",
    "order_id",
    "subscription_id",
];

/// Parallel name/value arrays for one field type.
///
/// Names and values are only ever pushed together, so both arrays always
/// have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields<T> {
    names: Vec<String>,
    values: Vec<T>,
}

impl<T> Fields<T> {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: T) {
        self.names.push(name.into());
        self.values.push(value);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Looks up the value stored under `name` (first match).
    pub fn get(&self, name: &str) -> Option<&T> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.values.get(idx)
    }
}

impl<T> Default for Fields<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Store-ready representation of one ingested log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Partition key, selects the destination table.
    pub partition: String,
    /// Event time in UTC.
    pub time: DateTime<Utc>,
    pub host: String,
    pub level: String,
    pub tag: String,
    pub pid: String,
    pub caller: String,
    /// Residual message text after structured parts were removed.
    pub msg: String,
    pub string_fields: Fields<String>,
    pub number_fields: Fields<f64>,
    pub boolean_fields: Fields<u8>,
    pub null_fields: Vec<String>,
    pub phone: u64,
    pub request_id: String,
    pub order_id: String,
    pub subscription_id: String,
}

/// Typed positional insert argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    UInt32(u32),
    UInt64(u64),
    String(String),
    StringArray(Vec<String>),
    Float64Array(Vec<f64>),
    UInt8Array(Vec<u8>),
}

impl Row {
    /// Positional arguments in [`INSERT_COLUMNS`] order.
    pub fn args(&self) -> Vec<Value> {
        let naive = self.time.naive_utc();
        // Leap-second nanos (>= 1e9) are folded back into range.
        let nsec = self.time.nanosecond() % 1_000_000_000;

        vec![
            Value::Date(naive.date()),
            Value::DateTime(naive.with_nanosecond(0).unwrap_or(naive)),
            Value::UInt32(nsec),
            Value::String(self.host.clone()),
            Value::String(self.level.clone()),
            Value::String(self.tag.clone()),
            Value::String(self.pid.clone()),
            Value::String(self.caller.clone()),
            Value::String(self.msg.clone()),
            Value::StringArray(self.string_fields.names().to_vec()),
            Value::StringArray(self.string_fields.values().to_vec()),
            Value::StringArray(self.number_fields.names().to_vec()),
            Value::Float64Array(self.number_fields.values().to_vec()),
            Value::StringArray(self.boolean_fields.names().to_vec()),
            Value::UInt8Array(self.boolean_fields.values().to_vec()),
            Value::StringArray(self.null_fields.clone()),
            Value::UInt64(self.phone),
            Value::String(self.request_id.clone()),
            Value::String(self.order_id.clone()),
            Value::String(self.subscription_id.clone()),
        ]
    }
}
