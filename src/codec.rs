use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::{value::TypedValue, MetricInstance};

pub const EVENT_TYPE: &str = "IstioMetrics";
const RESERVED_FIELDS: [&str; 3] = ["eventType", "metricName", "metricValue"];

/// JSON shape a `TypedValue` takes inside an event.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    /// Non-finite values serialize as `null`.
    Float(f64),
}
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Booleans stay strings and durations become seconds. Anything without a
/// dedicated rule falls back to its display rendering.
pub fn encode_value(value: &TypedValue) -> FieldValue {
    match value {
        TypedValue::String(s) => FieldValue::Text(s.clone()),
        TypedValue::Int64(v) => FieldValue::Int(*v),
        TypedValue::Double(v) => FieldValue::Float(*v),
        TypedValue::Bool(v) => FieldValue::Text(v.to_string()),
        TypedValue::Duration(d) => match d.as_secs_f64() {
            Ok(secs) => FieldValue::Float(secs),
            Err(e) => {
                log::warn!("err: {e}");
                FieldValue::Text(d.to_string())
            }
        },
        other => FieldValue::Text(other.to_string()),
    }
}

/// One flat Insights event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<'a> {
    metric_name: &'a str,
    metric_value: FieldValue,
    dimensions: Vec<(&'a str, FieldValue)>,
}
impl<'a> Event<'a> {
    pub fn new(instance: &'a MetricInstance) -> Self {
        let metric_value = encode_value(&instance.value);
        let mut dimensions = Vec::with_capacity(instance.dimensions.len());
        for (key, value) in &instance.dimensions {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                log::warn!(
                    "dimension `{key}` of metric `{}` shadows a reserved field; dropped",
                    instance.name
                );
                continue;
            }
            dimensions.push((key.as_str(), encode_value(value)));
        }
        Self {
            metric_name: &instance.name,
            metric_value,
            dimensions,
        }
    }
}
impl Serialize for Event<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.dimensions.len()))?;
        map.serialize_entry("eventType", EVENT_TYPE)?;
        map.serialize_entry("metricName", self.metric_name)?;
        map.serialize_entry("metricValue", &self.metric_value)?;
        for (key, value) in &self.dimensions {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Encodes a batch as a JSON array of events, one per instance, in order.
pub fn encode_batch(batch: &[MetricInstance]) -> serde_json::Result<Vec<u8>> {
    let events: Vec<Event<'_>> = batch.iter().map(Event::new).collect();
    serde_json::to_vec(&events)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use super::*;
    use crate::value::ProtoDuration;

    fn instance(name: &str, value: TypedValue, dims: &[(&str, TypedValue)]) -> MetricInstance {
        let dimensions = dims
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>();
        MetricInstance {
            name: name.into(),
            value,
            dimensions,
        }
    }

    fn decode(batch: &[MetricInstance]) -> Vec<Value> {
        let bytes = encode_batch(batch).unwrap();
        match serde_json::from_slice(&bytes).unwrap() {
            Value::Array(events) => events,
            other => panic!("not an array: {other}"),
        }
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(encode_batch(&[]).unwrap(), b"[]");
    }

    #[test]
    fn test_order_and_length() {
        let batch: Vec<_> = (0..5)
            .map(|i| instance(&format!("m{i}"), TypedValue::Int64(i), &[]))
            .collect();
        let events = decode(&batch);
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event["metricName"], json!(format!("m{i}")));
            assert_eq!(event["metricValue"], json!(i));
            assert_eq!(event["eventType"], json!(EVENT_TYPE));
        }
    }

    #[test]
    fn test_no_trailing_separator() {
        let batch = [
            instance("a", TypedValue::Int64(1), &[]),
            instance("b", TypedValue::Int64(2), &[]),
        ];
        let text = String::from_utf8(encode_batch(&batch).unwrap()).unwrap();
        assert!(text.ends_with("}]"));
        assert!(!text.contains(",]"));
    }

    #[test]
    fn test_value_policy() {
        let batch = [instance(
            "requests",
            TypedValue::Int64(42),
            &[
                ("code", TypedValue::String("200".into())),
                ("ratio", TypedValue::Double(0.25)),
                ("secure", TypedValue::Bool(true)),
                ("latency", TypedValue::Duration(ProtoDuration::new(1, 500_000_000))),
                ("source", TypedValue::IpAddress("10.0.0.1".parse().unwrap())),
                ("host", TypedValue::DnsName("svc.local".into())),
            ],
        )];
        let events = decode(&batch);
        let event = &events[0];
        assert_eq!(event["metricValue"], json!(42));
        assert_eq!(event["code"], json!("200"));
        assert_eq!(event["ratio"], json!(0.25));
        assert_eq!(event["secure"], json!("true"));
        assert_eq!(event["latency"], json!(1.5));
        assert_eq!(event["source"], json!("10.0.0.1"));
        assert_eq!(event["host"], json!("svc.local"));
    }

    #[test]
    fn test_bool_metric_value_is_string() {
        let events = decode(&[instance("up", TypedValue::Bool(true), &[])]);
        assert_eq!(events[0]["metricValue"], json!("true"));
    }

    #[test]
    fn test_bad_duration_falls_back() {
        let bad = ProtoDuration::new(1, 2_000_000_000);
        let batch = [
            instance(
                "latency",
                TypedValue::Double(3.5),
                &[
                    ("spent", TypedValue::Duration(bad)),
                    ("route", TypedValue::String("/".into())),
                ],
            ),
            instance("other", TypedValue::Int64(7), &[]),
            instance(
                "mixed_sign",
                TypedValue::Duration(ProtoDuration::new(-1, 5)),
                &[("ok", TypedValue::Int64(1))],
            ),
        ];
        let events = decode(&batch);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["spent"], json!("seconds:1 nanos:2000000000"));
        assert_eq!(events[0]["route"], json!("/"));
        assert_eq!(events[0]["metricValue"], json!(3.5));
        assert_eq!(events[1]["metricValue"], json!(7));
        assert_eq!(events[2]["metricValue"], json!("seconds:-1 nanos:5"));
        assert_eq!(events[2]["ok"], json!(1));
    }

    #[test]
    fn test_escaping() {
        let batch = [instance(
            "quote\"name",
            TypedValue::String("line\nbreak \\ \"q\"".into()),
            &[("key\"x", TypedValue::String("v".into()))],
        )];
        let events = decode(&batch);
        assert_eq!(events[0]["metricName"], json!("quote\"name"));
        assert_eq!(events[0]["metricValue"], json!("line\nbreak \\ \"q\""));
        assert_eq!(events[0]["key\"x"], json!("v"));
    }

    #[test]
    fn test_reserved_dimension_dropped() {
        let batch = [instance(
            "real",
            TypedValue::Int64(1),
            &[
                ("metricName", TypedValue::String("fake".into())),
                ("zone", TypedValue::String("a".into())),
            ],
        )];
        let text = String::from_utf8(encode_batch(&batch).unwrap()).unwrap();
        assert_eq!(
            text,
            r#"[{"eventType":"IstioMetrics","metricName":"real","metricValue":1,"zone":"a"}]"#
        );
    }

    #[test]
    fn test_dimensions_sorted() {
        let batch = [instance(
            "m",
            TypedValue::Int64(0),
            &[("b", TypedValue::Int64(2)), ("a", TypedValue::Int64(1))],
        )];
        let text = String::from_utf8(encode_batch(&batch).unwrap()).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_non_finite_double() {
        let events = decode(&[instance("nan", TypedValue::Double(f64::NAN), &[])]);
        assert_eq!(events[0]["metricValue"], Value::Null);
    }
}
