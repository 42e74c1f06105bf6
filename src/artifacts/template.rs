use std::fmt;

use regex::Regex;

use crate::foundation::error::{RadarError, RadarResult};

/// Integer placeholder in a frame template.
pub const PLACEHOLDER: &str = "%d";
/// Extension appended to templates that do not name one.
pub const DEFAULT_EXTENSION: &str = "png";

/// File name template for numbered frames, e.g. `frame_%d.png`.
///
/// Exactly one `%d` placeholder. A template without an extension after the placeholder gets
/// `.png`, so `frame_%d` and `frame_%d.png` name the same files.
#[derive(Clone, Debug)]
pub struct FrameTemplate {
    prefix: String,
    suffix: String,
    strict: Regex,
}

impl FrameTemplate {
    /// Validate and normalize a template.
    pub fn parse(raw: &str) -> RadarResult<Self> {
        if raw.matches(PLACEHOLDER).count() != 1 {
            return Err(RadarError::validation(format!(
                "frame template '{raw}' must contain exactly one '{PLACEHOLDER}'"
            )));
        }
        if raw.contains(['/', '\\']) {
            return Err(RadarError::validation(format!(
                "frame template '{raw}' must be a file name, not a path"
            )));
        }

        let (prefix, rest) = raw
            .split_once(PLACEHOLDER)
            .ok_or_else(|| RadarError::validation("frame template has no placeholder"))?;
        let suffix = if rest.contains('.') {
            rest.to_string()
        } else {
            format!("{rest}.{DEFAULT_EXTENSION}")
        };

        let strict = Regex::new(&format!(
            "^{}([0-9]+){}$",
            regex::escape(prefix),
            regex::escape(&suffix)
        ))
        .map_err(|e| RadarError::validation(format!("frame template '{raw}': {e}")))?;

        Ok(Self {
            prefix: prefix.to_string(),
            suffix,
            strict,
        })
    }

    /// File name of frame `index`.
    pub fn file_name(&self, index: usize) -> String {
        format!("{}{index}{}", self.prefix, self.suffix)
    }

    /// Loose shell pattern, e.g. `frame_*.png`. Literal parts are escaped.
    pub fn glob_pattern(&self) -> String {
        format!(
            "{}*{}",
            glob::Pattern::escape(&self.prefix),
            glob::Pattern::escape(&self.suffix)
        )
    }

    /// Frame index encoded in `file_name`, if it matches the numeric form exactly.
    pub fn index_of(&self, file_name: &str) -> Option<usize> {
        self.strict
            .captures(file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Companion file sharing the prefix, e.g. `frame_legend.png`.
    pub fn sibling(&self, label: &str) -> String {
        format!("{}{label}{}", self.prefix, self.suffix)
    }
}

impl fmt::Display for FrameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PLACEHOLDER}{}", self.prefix, self.suffix)
    }
}

impl PartialEq for FrameTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.suffix == other.suffix
    }
}

impl Eq for FrameTemplate {}

impl serde::Serialize for FrameTemplate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for FrameTemplate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/artifacts/template.rs"]
mod tests;
