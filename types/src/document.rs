use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable handle for a document, usually its URI string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline role a shader source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    #[default]
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Guess the stage from a file name or URI.
    ///
    /// This is a naming-convention heuristic, not a guarantee: `.vert` and
    /// `vs.glsl` mean vertex, `.frag` and `fs.glsl` mean fragment, `.comp`
    /// means compute, and anything else falls back to fragment.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".vert") || name.ends_with("vs.glsl") {
            Self::Vertex
        } else if name.ends_with(".comp") {
            Self::Compute
        } else {
            // covers `.frag` and `fs.glsl` as well as the fallback
            Self::Fragment
        }
    }

    /// Value passed to the validator's `-S` flag.
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
            Self::Compute => "comp",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown shader stage '{}' (expected vert, frag or comp)", self.0)
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for ShaderStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vert" | "vertex" => Ok(Self::Vertex),
            "frag" | "fragment" => Ok(Self::Fragment),
            "comp" | "compute" => Ok(Self::Compute),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_vertex() {
        assert_eq!(ShaderStage::infer("water.vert"), ShaderStage::Vertex);
        assert_eq!(ShaderStage::infer("file:///x/waterVS.glsl"), ShaderStage::Vertex);
        assert_eq!(ShaderStage::infer("water.vs.glsl"), ShaderStage::Vertex);
    }

    #[test]
    fn infer_fragment() {
        assert_eq!(ShaderStage::infer("water.frag"), ShaderStage::Fragment);
        assert_eq!(ShaderStage::infer("water_fs.glsl"), ShaderStage::Fragment);
    }

    #[test]
    fn infer_compute() {
        assert_eq!(ShaderStage::infer("/tmp/blur.comp"), ShaderStage::Compute);
    }

    #[test]
    fn infer_defaults_to_fragment() {
        assert_eq!(ShaderStage::infer("common.glsl"), ShaderStage::Fragment);
        assert_eq!(ShaderStage::infer("untitled:Untitled-1"), ShaderStage::Fragment);
        assert_eq!(ShaderStage::infer(""), ShaderStage::Fragment);
    }

    #[test]
    fn flags_match_validator_cli() {
        assert_eq!(ShaderStage::Vertex.flag(), "vert");
        assert_eq!(ShaderStage::Fragment.flag(), "frag");
        assert_eq!(ShaderStage::Compute.flag(), "comp");
    }

    #[test]
    fn parse_stage_names() {
        assert_eq!("vert".parse::<ShaderStage>(), Ok(ShaderStage::Vertex));
        assert_eq!("compute".parse::<ShaderStage>(), Ok(ShaderStage::Compute));
        assert!("geom".parse::<ShaderStage>().is_err());
    }

    #[test]
    fn document_id_display_is_uri() {
        let id = DocumentId::new("file:///a.frag");
        assert_eq!(id.to_string(), "file:///a.frag");
        assert_eq!(id.as_str(), "file:///a.frag");
    }
}
