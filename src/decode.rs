//! Decoding the simulator's `Key: value` report.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

pub const TOTAL_PAGE_FAULTS: &str = "Total page faults";

/// The decoded report of one simulator run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub total_page_faults: u64,
    /// Every other reported field, untouched.
    pub fields: BTreeMap<String, Value>,
}

impl SimulationResult {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.field("Algorithm").and_then(Value::as_str)
    }
}

#[derive(Debug, Error)]
pub enum MalformedResultError {
    #[error("simulator output is not a well-formed document")]
    Parse(#[from] serde_yaml::Error),
    #[error("simulator output is not a key/value document")]
    NotAMapping,
    #[error("simulator output has no '{0}' field")]
    MissingField(&'static str),
    #[error("field '{field}' is not a non-negative integer: {value}")]
    InvalidField { field: &'static str, value: String },
}

pub trait ResultDecoder {
    fn decode(&self, text: &str) -> Result<SimulationResult, MalformedResultError>;
}

/// Reads the report as YAML. vmsim's `Key: value` lines are a YAML mapping,
/// and so is a JSON object. vmsim repeats `WARNING:` lines, so a repeated key
/// keeps its last value.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDecoder;

impl ResultDecoder for YamlDecoder {
    fn decode(&self, text: &str) -> Result<SimulationResult, MalformedResultError> {
        if text.trim().is_empty() {
            return Err(MalformedResultError::NotAMapping);
        }
        let Report::Mapping(mapping) = serde_yaml::from_str::<Report>(text)? else {
            return Err(MalformedResultError::NotAMapping);
        };

        let mut total = None;
        let mut fields = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => render(&other),
            };
            if key == TOTAL_PAGE_FAULTS {
                total = Some(value);
            } else {
                fields.insert(key, value);
            }
        }

        let total = total.ok_or(MalformedResultError::MissingField(TOTAL_PAGE_FAULTS))?;
        let total_page_faults =
            total
                .as_u64()
                .ok_or_else(|| MalformedResultError::InvalidField {
                    field: TOTAL_PAGE_FAULTS,
                    value: render(&total),
                })?;

        Ok(SimulationResult {
            total_page_faults,
            fields,
        })
    }
}

/// The top-level document. Only a mapping is a report.
enum Report {
    Mapping(Mapping),
    Other,
}

impl<'de> Deserialize<'de> for Report {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ReportVisitor)
    }
}

struct ReportVisitor;

impl<'de> Visitor<'de> for ReportVisitor {
    type Value = Report;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a key/value report")
    }

    // `Mapping::insert` replaces, so the last of a repeated key wins.
    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Report, A::Error> {
        let mut mapping = Mapping::new();
        while let Some((key, value)) = access.next_entry::<Value, Value>()? {
            mapping.insert(key, value);
        }
        Ok(Report::Mapping(mapping))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Report, A::Error> {
        while access.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Report::Other)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Report, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Report, E> {
        Ok(Report::Other)
    }

    fn visit_none<E: de::Error>(self) -> Result<Report, E> {
        Ok(Report::Other)
    }
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

pub fn decode(text: &str) -> Result<SimulationResult, MalformedResultError> {
    YamlDecoder.decode(text)
}
