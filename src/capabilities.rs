use crate::error::Result;
use crate::xml;

/// Label the service uses for "deliver in the native format".
pub const NO_REFORMATTING: &str = "No reformatting";

/// Customization options a dataset supports, read from its capability document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether any subsetting agent is available at all.
    pub has_subset_agent: bool,
    /// Variable paths usable in `Coverage`, always `/`-separated with a leading slash.
    pub variables: Vec<String>,
    pub formats: Vec<String>,
    /// Output formats that can be combined with reprojection.
    pub reprojection_formats: Vec<String>,
    pub projections: Vec<String>,
}

impl Capabilities {
    pub fn parse(doc: &str) -> Result<Self> {
        let root = xml::parse(doc)?;

        let has_subset_agent = !root.descendants("SubsetAgent").is_empty();

        let variables = root
            .descendants("SubsetVariable")
            .into_iter()
            .filter_map(|v| v.attr("value"))
            .map(normalize_variable)
            .collect();

        let formats = root
            .descendants("Format")
            .into_iter()
            .filter_map(|f| f.attr("value"))
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.to_string())
            .collect();

        let mut reprojection_formats: Vec<String> = root
            .descendants("Projections")
            .first()
            .and_then(|p| p.attr("normalProj"))
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .map(|x| x.to_string())
                    .collect()
            })
            .unwrap_or_default();
        if has_subset_agent {
            reprojection_formats.push(NO_REFORMATTING.to_string());
        }

        let projections = root
            .descendants("Projection")
            .into_iter()
            .filter_map(|p| p.attr("value"))
            .filter(|v| *v != "NO_CHANGE" && !v.trim().is_empty())
            .map(|v| v.to_string())
            .collect();

        Ok(Self {
            has_subset_agent,
            variables,
            formats,
            reprojection_formats,
            projections,
        })
    }

    /// Formats that cannot be combined with reprojection.
    pub fn formats_without_reprojection(&self) -> Vec<&str> {
        self.formats
            .iter()
            .filter(|f| !self.reprojection_formats.contains(f))
            .map(|f| f.as_str())
            .collect()
    }

    pub fn supports_variable(&self, variable: &str) -> bool {
        let v = normalize_variable(variable);
        self.variables.iter().any(|x| *x == v)
    }
}

/// `gt1l:sea_ice_segments:height` -> `/gt1l/sea_ice_segments/height`
pub fn normalize_variable(raw: &str) -> String {
    let v = raw.trim().replace(':', "/");
    if v.starts_with('/') { v } else { format!("/{v}") }
}
