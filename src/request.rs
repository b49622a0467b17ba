use std::collections::BTreeMap;

use serde::Serialize;

/// Value type for a request keyword.
///
/// Serialized untagged, so a request maps straight onto the JSON `inputs`
/// object the CDS API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestValue {
    Str(String),
    Int(i64),
    StrList(Vec<String>),
    FloatList(Vec<f64>),
}

impl From<&str> for RequestValue {
    fn from(value: &str) -> Self {
        RequestValue::Str(value.to_string())
    }
}

impl From<String> for RequestValue {
    fn from(value: String) -> Self {
        RequestValue::Str(value)
    }
}

impl From<u32> for RequestValue {
    fn from(value: u32) -> Self {
        RequestValue::Int(i64::from(value))
    }
}

impl From<Vec<String>> for RequestValue {
    fn from(value: Vec<String>) -> Self {
        RequestValue::StrList(value)
    }
}

impl From<&[String]> for RequestValue {
    fn from(value: &[String]) -> Self {
        RequestValue::StrList(value.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for RequestValue {
    fn from(value: [&str; N]) -> Self {
        RequestValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[f64; N]> for RequestValue {
    fn from(value: [f64; N]) -> Self {
        RequestValue::FloatList(value.to_vec())
    }
}

/// CDS request expressed as keyword/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Request {
    inner: BTreeMap<String, RequestValue>,
}

impl Request {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Insert a keyword/value pair (value can be a scalar or list).
    pub fn kw(mut self, key: impl Into<String>, value: impl Into<RequestValue>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    // Convenience builders for the keywords used by the CDS datasets.
    pub fn format(self, v: impl Into<RequestValue>) -> Self {
        self.kw("format", v)
    }

    pub fn variable(self, v: impl Into<RequestValue>) -> Self {
        self.kw("variable", v)
    }

    pub fn product_type(self, v: impl Into<RequestValue>) -> Self {
        self.kw("product_type", v)
    }

    pub fn originating_centre(self, v: impl Into<RequestValue>) -> Self {
        self.kw("originating_centre", v)
    }

    pub fn system(self, v: impl Into<RequestValue>) -> Self {
        self.kw("system", v)
    }

    pub fn year(self, v: impl Into<RequestValue>) -> Self {
        self.kw("year", v)
    }

    pub fn month(self, v: impl Into<RequestValue>) -> Self {
        self.kw("month", v)
    }

    pub fn leadtime_month(self, v: impl Into<RequestValue>) -> Self {
        self.kw("leadtime_month", v)
    }

    pub fn time(self, v: impl Into<RequestValue>) -> Self {
        self.kw("time", v)
    }

    pub fn area(self, v: impl Into<RequestValue>) -> Self {
        self.kw("area", v)
    }

    pub fn grid(self, v: impl Into<RequestValue>) -> Self {
        self.kw("grid", v)
    }

    pub fn get(&self, key: &str) -> Option<&RequestValue> {
        self.inner.get(key)
    }
}
