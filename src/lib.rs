use std::collections::BTreeMap;

use serde::Deserialize;

use crate::value::TypedValue;

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod exporter;
pub mod value;

/// One telemetry data point: a named value with its dimensions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricInstance {
    pub name: String,
    pub value: TypedValue,
    #[serde(default)]
    pub dimensions: BTreeMap<String, TypedValue>,
}
