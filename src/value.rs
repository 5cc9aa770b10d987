//! Caller-supplied substitution values.

use std::fmt;

use serde::Deserialize;

/// A value substituted for a marker. Keeps "absent", "empty" and "zero" apart so the rendering
/// rule is explicit: absent, empty text and `false` render as nothing, everything else
/// (integer zero and the text `"0"` included) renders as its string form.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Absent,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl TemplateValue {
    pub fn render(&self) -> String {
        match self {
            TemplateValue::Absent | TemplateValue::Bool(false) => String::new(),
            TemplateValue::Bool(true) => "1".to_string(),
            TemplateValue::Integer(i) => i.to_string(),
            TemplateValue::Float(f) => format_number(*f),
            TemplateValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<i64> for TemplateValue {
    fn from(i: i64) -> Self {
        TemplateValue::Integer(i)
    }
}

impl From<f64> for TemplateValue {
    fn from(f: f64) -> Self {
        TemplateValue::Float(f)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(TemplateValue::Absent)
    }
}

/// Integral floats print without a fraction (`3` not `3.0`).
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// One row of a table expansion: fields in the order the caller gave them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, TemplateValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TemplateValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut record = Record::new();
        for (k, v) in map {
            let value = TemplateValue::deserialize(v).map_err(serde::de::Error::custom)?;
            record.insert(k, value);
        }
        Ok(record)
    }
}
