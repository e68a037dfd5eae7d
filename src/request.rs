use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Value type for a request parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestValue {
    Str(String),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
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

impl From<&String> for RequestValue {
    fn from(value: &String) -> Self {
        RequestValue::Str(value.clone())
    }
}

impl From<i64> for RequestValue {
    fn from(value: i64) -> Self {
        RequestValue::Int(value)
    }
}

impl From<i32> for RequestValue {
    fn from(value: i32) -> Self {
        RequestValue::Int(value as i64)
    }
}

impl From<u32> for RequestValue {
    fn from(value: u32) -> Self {
        RequestValue::Int(value as i64)
    }
}

impl From<usize> for RequestValue {
    fn from(value: usize) -> Self {
        RequestValue::Int(value as i64)
    }
}

impl From<f64> for RequestValue {
    fn from(value: f64) -> Self {
        RequestValue::Float(value)
    }
}

impl From<Vec<String>> for RequestValue {
    fn from(value: Vec<String>) -> Self {
        RequestValue::StrList(value)
    }
}

impl From<Vec<&str>> for RequestValue {
    fn from(value: Vec<&str>) -> Self {
        RequestValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RequestValue {
    fn from(value: [&str; N]) -> Self {
        RequestValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<BoundingBox> for RequestValue {
    fn from(value: BoundingBox) -> Self {
        RequestValue::Str(value.to_string())
    }
}

impl From<RequestMode> for RequestValue {
    fn from(value: RequestMode) -> Self {
        RequestValue::Str(value.as_str().to_string())
    }
}

impl RequestValue {
    /// Parse a user-provided string into a best-effort [`RequestValue`].
    ///
    /// Whole numbers become `Int`, other numbers `Float`, anything else stays a
    /// string. Comma separated input (`"140,72,153,80"`) is kept verbatim since
    /// the service takes those as a single comma joined value anyway.
    pub fn parse_auto(s: &str) -> Self {
        let t = s.trim();
        if let Ok(v) = t.parse::<i64>() {
            RequestValue::Int(v)
        } else if let Ok(v) = t.parse::<f64>() {
            RequestValue::Float(v)
        } else {
            RequestValue::Str(t.to_string())
        }
    }

    /// Render the value the way it goes on the wire.
    pub fn to_param_string(&self) -> String {
        match self {
            RequestValue::Str(s) => s.clone(),
            RequestValue::Int(i) => i.to_string(),
            RequestValue::Float(f) => f.to_string(),
            RequestValue::StrList(xs) => xs.join(","),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RequestValue::Str(s) => s.trim().is_empty(),
            RequestValue::StrList(xs) => xs.iter().all(|x| x.trim().is_empty()),
            RequestValue::Int(_) | RequestValue::Float(_) => false,
        }
    }
}

impl fmt::Display for RequestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param_string())
    }
}

/// Spatial extent in degrees: west, south, east, north.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        let bb = Self { west, south, east, north };
        bb.validate()?;
        Ok(bb)
    }

    pub fn validate(&self) -> Result<()> {
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        if !(lon_ok(self.west) && lon_ok(self.east)) {
            return Err(Error::InvalidRequest(format!(
                "bounding box longitudes out of range: {self}"
            )));
        }
        if !(lat_ok(self.south) && lat_ok(self.north)) || self.south > self.north {
            return Err(Error::InvalidRequest(format!(
                "bounding box latitudes out of range: {self}"
            )));
        }
        Ok(())
    }

    /// Parse `"west,south,east,north"`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::InvalidRequest(format!("invalid bounding box: {s}")))?;
        match parts.as_slice() {
            [w, s_, e, n] => Self::new(*w, *s_, *e, *n),
            _ => Err(Error::InvalidRequest(format!(
                "bounding box needs 4 values, got {}",
                parts.len()
            ))),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// How the order endpoint should deliver results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Queue an order, poll it, fetch a zip when done.
    #[default]
    Async,
    /// Return the zip in the response body.
    Stream,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Async => "async",
            RequestMode::Stream => "stream",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" => Ok(RequestMode::Async),
            "stream" => Ok(RequestMode::Stream),
            other => Err(Error::InvalidRequest(format!("unknown request_mode: {other}"))),
        }
    }
}

/// Parameters that narrow an order in space or time. At least one is required.
const SCOPING_KEYS: [&str; 5] = ["bounding_box", "bbox", "polygon", "temporal", "time"];

/// Order/search parameters expressed as keyword/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub(crate) inner: BTreeMap<String, RequestValue>,
}

impl Request {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Insert a keyword/value pair, replacing any previous value for that key.
    pub fn kw(mut self, key: impl Into<String>, value: impl Into<RequestValue>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RequestValue>,
    {
        pairs.into_iter().fold(Self::new(), |r, (k, v)| r.kw(k, v))
    }

    /// Construct a request from string pairs (typical for CLI/config inputs).
    /// Values are parsed with [`RequestValue::parse_auto`].
    pub fn from_str_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |r, (k, v)| r.kw(k, RequestValue::parse_auto(v.as_ref())))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<RequestValue>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn short_name(self, v: impl Into<RequestValue>) -> Self {
        self.kw("short_name", v)
    }

    pub fn version(self, v: impl Into<RequestValue>) -> Self {
        self.kw("version", v)
    }

    /// CMR style temporal filter, `start,end` in ISO 8601.
    pub fn temporal(self, v: impl Into<RequestValue>) -> Self {
        self.kw("temporal", v)
    }

    /// Temporal subsetting of the granule contents.
    pub fn time(self, v: impl Into<RequestValue>) -> Self {
        self.kw("time", v)
    }

    /// CMR style spatial filter.
    pub fn bounding_box(self, v: impl Into<RequestValue>) -> Self {
        self.kw("bounding_box", v)
    }

    /// Spatial subsetting of the granule contents.
    pub fn bbox(self, v: impl Into<RequestValue>) -> Self {
        self.kw("bbox", v)
    }

    pub fn polygon(self, v: impl Into<RequestValue>) -> Self {
        self.kw("polygon", v)
    }

    pub fn format(self, v: impl Into<RequestValue>) -> Self {
        self.kw("format", v)
    }

    pub fn projection(self, v: impl Into<RequestValue>) -> Self {
        self.kw("projection", v)
    }

    pub fn projection_parameters(self, v: impl Into<RequestValue>) -> Self {
        self.kw("projection_parameters", v)
    }

    /// Variable subsetting; the service spells this key with a capital C.
    pub fn coverage(self, v: impl Into<RequestValue>) -> Self {
        self.kw("Coverage", v)
    }

    pub fn email(self, v: impl Into<RequestValue>) -> Self {
        self.kw("email", v)
    }

    pub fn page_size(self, v: impl Into<RequestValue>) -> Self {
        self.kw("page_size", v)
    }

    pub fn page_num(self, v: impl Into<RequestValue>) -> Self {
        self.kw("page_num", v)
    }

    pub fn request_mode(self, v: RequestMode) -> Self {
        self.kw("request_mode", v)
    }

    pub fn agent(self, v: impl Into<RequestValue>) -> Self {
        self.kw("agent", v)
    }

    pub fn include_meta(self, v: bool) -> Self {
        self.kw("include_meta", if v { "Y" } else { "N" })
    }

    pub fn get(&self, key: &str) -> Option<&RequestValue> {
        self.inner.get(key)
    }

    /// Non-blank string form of a parameter.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .filter(|v| !v.is_blank())
            .map(|v| v.to_param_string())
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.remove(key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RequestValue)> {
        self.inner.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, RequestValue> {
        self.inner
    }

    pub fn mode(&self) -> Result<RequestMode> {
        match self.get_str("request_mode") {
            Some(m) => RequestMode::parse(&m),
            None => Ok(RequestMode::default()),
        }
    }

    pub fn page_size_or(&self, default: u32) -> Result<u32> {
        let Some(v) = self.get_str("page_size") else {
            return Ok(default);
        };
        match v.parse::<u32>() {
            Ok(0) | Err(_) => Err(Error::InvalidRequest(format!("invalid page_size: {v}"))),
            Ok(n) => Ok(n),
        }
    }

    /// Check the parameters an order needs before anything goes over the wire.
    pub fn validate(&self) -> Result<()> {
        if self.get_str("short_name").is_none() {
            return Err(Error::InvalidRequest("short_name is required".into()));
        }
        if self.get_str("version").is_none() {
            return Err(Error::InvalidRequest("version is required".into()));
        }
        if !SCOPING_KEYS.iter().any(|k| self.get_str(k).is_some()) {
            return Err(Error::InvalidRequest(format!(
                "at least one of {} is required",
                SCOPING_KEYS.join(", ")
            )));
        }
        for key in ["bounding_box", "bbox"] {
            if let Some(v) = self.get_str(key) {
                BoundingBox::parse(&v)?;
            }
        }
        self.mode()?;
        Ok(())
    }

    /// Parameters as wire pairs, blank values dropped.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .filter(|(_, v)| !v.is_blank())
            .map(|(k, v)| (k.clone(), v.to_param_string()))
            .collect()
    }

    /// Unencoded `k=v&k=v` rendering, for display.
    pub fn to_query_string(&self) -> String {
        self.to_query_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atl07() -> Request {
        Request::new()
            .short_name("ATL07")
            .version("002")
            .bounding_box("140,72,153,80")
            .temporal("2019-03-23T00:00:00Z,2019-03-23T23:59:59Z")
    }

    #[test]
    fn parse_auto_numbers_and_strings() {
        assert_eq!(RequestValue::parse_auto("10"), RequestValue::Int(10));
        assert_eq!(RequestValue::parse_auto("2.5"), RequestValue::Float(2.5));
        assert_eq!(
            RequestValue::parse_auto("140,72,153,80"),
            RequestValue::Str("140,72,153,80".to_string())
        );
        assert_eq!(RequestValue::parse_auto(" ATL07 "), RequestValue::Str("ATL07".into()));
    }

    #[test]
    fn lists_render_comma_joined() {
        let v = RequestValue::from(["/gt1l/sea_ice_segments/latitude", "/gt1l/sea_ice_segments/longitude"]);
        assert_eq!(
            v.to_param_string(),
            "/gt1l/sea_ice_segments/latitude,/gt1l/sea_ice_segments/longitude"
        );
    }

    #[test]
    fn blank_values_are_dropped_from_query() {
        let r = atl07().format("").email("").page_size(10);
        let keys: Vec<String> = r.to_query_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["bounding_box", "page_size", "short_name", "temporal", "version"]);
        assert!(!r.to_query_string().contains("format="));
    }

    #[test]
    fn later_value_replaces_earlier() {
        let r = Request::from_str_pairs([("version", "001"), ("version", "002")]);
        assert_eq!(r.get_str("version").as_deref(), Some("002"));
    }

    #[test]
    fn validate_requires_name_version_and_scope() {
        assert!(atl07().validate().is_ok());

        let no_name = Request::new().version("002").temporal("x");
        assert!(matches!(no_name.validate(), Err(Error::InvalidRequest(_))));

        let no_scope = Request::new().short_name("ATL07").version("002");
        assert!(matches!(no_scope.validate(), Err(Error::InvalidRequest(_))));

        let time_only = Request::new()
            .short_name("ATL07")
            .version("002")
            .time("2019-03-23T00:00:00,2019-03-23T23:59:59");
        assert!(time_only.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_bbox_and_mode() {
        let r = atl07().bbox("140,72,153");
        assert!(r.validate().is_err());
        let r = atl07().kw("request_mode", "later");
        assert!(r.validate().is_err());
    }

    #[test]
    fn bounding_box_parses_and_displays() {
        let bb = BoundingBox::parse("140, 72, 153, 80").unwrap();
        assert_eq!(bb, BoundingBox { west: 140.0, south: 72.0, east: 153.0, north: 80.0 });
        assert_eq!(bb.to_string(), "140,72,153,80");
        assert!(BoundingBox::new(0.0, 80.0, 10.0, 70.0).is_err());
        assert!(BoundingBox::new(-200.0, 0.0, 10.0, 10.0).is_err());
    }

    #[test]
    fn page_size_and_mode_defaults() {
        let r = atl07();
        assert_eq!(r.page_size_or(10).unwrap(), 10);
        assert_eq!(r.mode().unwrap(), RequestMode::Async);
        let r = r.page_size(25).request_mode(RequestMode::Stream);
        assert_eq!(r.page_size_or(10).unwrap(), 25);
        assert_eq!(r.mode().unwrap(), RequestMode::Stream);
        assert!(atl07().page_size(0).page_size_or(10).is_err());
    }
}
