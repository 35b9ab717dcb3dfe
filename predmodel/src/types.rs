use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column names in model order.
pub const FEATURES: [&str; 3] = ["avgPower", "timeElapsed", "PCEmissions"];
pub const N_FEATURES: usize = FEATURES.len();

#[derive(Debug)]
pub struct PredictRequest {
    // kept as raw JSON so an absent/empty payload and a malformed one map to different errors
    pub data: Option<Value>,
}

impl From<Value> for PredictRequest {
    /// Only a top-level object can carry a `data` key; anything else sent nothing.
    fn from(body: Value) -> Self {
        let data = match body {
            Value::Object(mut fields) => fields.remove("data"),
            _ => None,
        };
        Self { data }
    }
}

/// One energy reading. Extra keys in the payload are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Record {
    #[serde(rename = "avgPower")]
    pub avg_power: f64,
    #[serde(rename = "timeElapsed")]
    pub time_elapsed: f64,
    #[serde(rename = "PCEmissions")]
    pub pc_emissions: f64,
}

impl Record {
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [self.avg_power, self.time_elapsed, self.pc_emissions]
    }

    pub fn from_array(v: [f64; N_FEATURES]) -> Self {
        Self {
            avg_power: v[0],
            time_elapsed: v[1],
            pc_emissions: v[2],
        }
    }
}

// Column-oriented payload: {"avgPower": [...], "timeElapsed": [...], "PCEmissions": [...]}
#[derive(Debug, Deserialize)]
struct Columns {
    #[serde(rename = "avgPower")]
    avg_power: Vec<f64>,
    #[serde(rename = "timeElapsed")]
    time_elapsed: Vec<f64>,
    #[serde(rename = "PCEmissions")]
    pc_emissions: Vec<f64>,
}

/// Why a `data` payload could not be turned into a table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("no data provided")]
    Empty,
    #[error("{0}")]
    Malformed(String),
}

/// True for the payloads that count as "nothing was sent".
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parse `data` into an ordered, uniform table of records.
///
/// Accepts either an array of row objects or an object of equal-length
/// columns.
pub fn parse_table(data: Option<Value>) -> Result<Vec<Record>, TableError> {
    let data = match data {
        Some(v) if !is_blank(&v) => v,
        _ => return Err(TableError::Empty),
    };

    match data {
        Value::Array(rows) => {
            // serde would also fill a Record from a positional array
            if let Some(i) = rows.iter().position(|r| !r.is_object()) {
                return Err(TableError::Malformed(format!(
                    "record {} is {}, expected an object with {}",
                    i,
                    kind_of(&rows[i]),
                    FEATURES.join(", ")
                )));
            }
            serde_json::from_value::<Vec<Record>>(Value::Array(rows))
                .map_err(|e| TableError::Malformed(e.to_string()))
        }
        Value::Object(_) => {
            let cols: Columns = serde_json::from_value(data)
                .map_err(|e| TableError::Malformed(e.to_string()))?;
            let n = cols.avg_power.len();
            if cols.time_elapsed.len() != n || cols.pc_emissions.len() != n {
                return Err(TableError::Malformed(format!(
                    "all columns must be the same length (got {}, {}, {})",
                    n,
                    cols.time_elapsed.len(),
                    cols.pc_emissions.len()
                )));
            }
            Ok((0..n)
                .map(|i| Record {
                    avg_power: cols.avg_power[i],
                    time_elapsed: cols.time_elapsed[i],
                    pc_emissions: cols.pc_emissions[i],
                })
                .collect())
        }
        other => Err(TableError::Malformed(format!(
            "expected an array of records or an object of columns, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(rename = "future_avgPower")]
    pub future_avg_power: f64,
    #[serde(rename = "future_timeElapsed")]
    pub future_time_elapsed: f64,
    /// Always reported as a magnitude.
    #[serde(rename = "future_PCEmissions")]
    pub future_pc_emissions: f64,
}

impl From<Record> for PredictResponse {
    fn from(r: Record) -> Self {
        Self {
            future_avg_power: r.avg_power,
            future_time_elapsed: r.time_elapsed,
            future_pc_emissions: r.pc_emissions.abs(),
        }
    }
}
