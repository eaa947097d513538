// Wire models for the charger cloud API.
//
// Only the fields the bridge reads are typed; everything else is kept in a
// flattened map so a refreshed record can be passed on without loss.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A charger ("mini") record from `/api/mini/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charger {
    /// Stable identity of the charger.
    pub address: String,
    /// `1` when the charger is disabled (locked), `0` otherwise.
    #[serde(default, deserialize_with = "flag_as_int")]
    pub is_disabled: i64,
    #[serde(default)]
    pub charger_model: Option<String>,
    #[serde(default)]
    pub charger_address: Option<String>,
    #[serde(default)]
    pub hub_address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The active charging session from `/api/session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub is_overridden: bool,
    /// Energy, power, duration and similar telemetry.
    #[serde(flatten)]
    pub telemetry: Map<String, Value>,
}

/// Payload of `/api/mini/status`.
///
/// The hub and the charger each report an HTTP-style code for their last
/// contact (e.g. `"200 OK"` or `200`). Anything outside 2xx means the
/// segment is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerStatus {
    #[serde(default)]
    pub hub_status: Option<Value>,
    #[serde(default)]
    pub charger_status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChargerStatus {
    pub fn hub_code(&self) -> String {
        code_text(self.hub_status.as_ref())
    }

    pub fn charger_code(&self) -> String {
        code_text(self.charger_status.as_ref())
    }

    /// Both segments report a 2xx-style code.
    pub fn is_reachable(&self) -> bool {
        looks_like_success(&self.hub_code()) && looks_like_success(&self.charger_code())
    }
}

/// Vehicle details from `/api/vehicle`. The shape varies per vehicle make,
/// so the document is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleInfo {
    pub raw: Value,
}

impl VehicleInfo {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

fn code_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// `"200"`, `"204 No Content"`, `"200OK"` pass; `"2000"`, `"500"`, `""` fail.
pub(crate) fn looks_like_success(code: &str) -> bool {
    let bytes = code.as_bytes();
    match bytes {
        [b'2', d1, d2, rest @ ..] if d1.is_ascii_digit() && d2.is_ascii_digit() => {
            rest.first().is_none_or(|c| !c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Accept `0`/`1`, `true`/`false`, or their string forms.
fn flag_as_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid flag: {n}"))),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid flag: {s:?}"))),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!("invalid flag: {other}"))),
    }
}
