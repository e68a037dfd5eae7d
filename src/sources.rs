/// Base URLs of the services a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// CMR search root, e.g. `https://cmr.earthdata.nasa.gov/search`.
    pub cmr: String,
    /// Earthdata access/service root (capabilities and orders).
    pub egi: String,
    /// Host serving finished order archives.
    pub esir: String,
}

/// Built-in endpoint sets.
///
/// If `source` is an `http(s)` URL, it is treated as a single root that serves
/// `/search`, `/egi` and `/esir` (handy for proxies and local mirrors).
pub fn source_to_endpoints(source: &str) -> Option<Endpoints> {
    match source {
        "nsidc" => Some(Endpoints {
            cmr: "https://cmr.earthdata.nasa.gov/search".to_string(),
            egi: "https://n5eil02u.ecs.nsidc.org/egi".to_string(),
            esir: "https://n5eil02u.ecs.nsidc.org/esir".to_string(),
        }),
        s if is_http_url(s) => {
            let root = s.trim_end_matches('/');
            Some(Endpoints {
                cmr: format!("{root}/search"),
                egi: format!("{root}/egi"),
                esir: format!("{root}/esir"),
            })
        }
        _ => None,
    }
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
