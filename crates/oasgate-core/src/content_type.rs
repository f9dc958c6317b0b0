//! # Content Type Resolution
//!
//! Two views of a `Content-Type` value:
//!
//! - [`ContentType`] is the lenient view used for cache keys and lookups. It
//!   strips any `boundary` parameter (so multipart keys are
//!   boundary-invariant) and yields interchangeable spellings through
//!   [`ContentType::equivalents`].
//! - [`MediaType`] is the strict RFC 6838 view used to decide whether a body
//!   can be validated as JSON. Wildcards such as `*/*` are not media types
//!   and fail to parse.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Cache-key fallback for requests and responses without a content type.
pub const NOT_PROVIDED: &str = "not_provided";

fn boundary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r";\s*boundary.*").expect("static regex"))
}

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    raw: Option<String>,
    without_boundary: Option<String>,
    media_type: Option<String>,
    charset: Option<String>,
}

impl ContentType {
    /// Parse a raw header value. `None` or a blank value yields an empty
    /// content type whose [`equivalents`](Self::equivalents) are empty.
    pub fn parse(header: Option<&str>) -> Self {
        let Some(raw) = header.filter(|h| !h.trim().is_empty()) else {
            return Self::default();
        };

        let without_boundary = boundary_pattern().replace(raw, "").into_owned();
        let mut parts = without_boundary.split(';');
        let media_type = parts.next().map(|m| m.trim().to_string());
        let charset = parts
            .next()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            raw: Some(raw.to_string()),
            without_boundary: Some(without_boundary),
            media_type,
            charset,
        }
    }

    /// The header exactly as received.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// `type/subtype`, trimmed, without parameters.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// The first parameter after the media type, e.g. `charset=utf-8`.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Whether a header was present.
    pub fn is_provided(&self) -> bool {
        self.without_boundary.is_some()
    }

    /// Interchangeable spellings of this content type.
    ///
    /// Without a charset: `[without-boundary, "<media>; charset=utf-8"]`.
    /// With one: `[media, "<media>; <charset>"]`. Empty when no header was
    /// present.
    pub fn equivalents(&self) -> Vec<String> {
        let (Some(without_boundary), Some(media)) = (&self.without_boundary, &self.media_type)
        else {
            return Vec::new();
        };
        match &self.charset {
            Some(charset) => vec![media.clone(), format!("{media}; {charset}")],
            None => vec![without_boundary.clone(), format!("{media}; charset=utf-8")],
        }
    }

    /// The first equivalent, or [`NOT_PROVIDED`].
    pub fn cache_key(&self) -> String {
        self.equivalents()
            .into_iter()
            .next()
            .unwrap_or_else(|| NOT_PROVIDED.to_string())
    }

    /// Key used for response lookups: multipart types drop their boundary,
    /// everything else is used verbatim.
    pub fn response_key(&self) -> String {
        match &self.raw {
            Some(raw) if raw.contains("multipart") => self.cache_key(),
            Some(raw) => raw.clone(),
            None => NOT_PROVIDED.to_string(),
        }
    }
}

/// Errors from strict media type parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaTypeError {
    /// The `type/subtype` part is malformed.
    #[error("invalid media type: {0}")]
    InvalidType(String),

    /// A `;`-separated parameter is malformed.
    #[error("invalid parameter format in content type: {0}")]
    InvalidParameter(String),
}

/// A strictly parsed media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Top-level type, lower-cased.
    pub kind: String,
    /// Subtype without suffix, lower-cased.
    pub subtype: String,
    /// Structured syntax suffix (`json` in `vnd.api+json`).
    pub suffix: Option<String>,
}

impl MediaType {
    /// Parse a full content type string, parameters included.
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();

        for parameter in parts {
            validate_parameter(parameter.trim())
                .map_err(|_| MediaTypeError::InvalidParameter(value.to_string()))?;
        }

        let (kind, full_subtype) = essence
            .split_once('/')
            .ok_or_else(|| MediaTypeError::InvalidType(value.to_string()))?;

        if !is_restricted_name(kind, false) || full_subtype.is_empty() {
            return Err(MediaTypeError::InvalidType(value.to_string()));
        }

        let (subtype, suffix) = match full_subtype.rsplit_once('+') {
            Some((subtype, suffix)) => (subtype, Some(suffix)),
            None => (full_subtype, None),
        };

        if !is_restricted_name(subtype, true) {
            return Err(MediaTypeError::InvalidType(value.to_string()));
        }
        if let Some(suffix) = suffix {
            if !is_restricted_name(suffix, true) {
                return Err(MediaTypeError::InvalidType(value.to_string()));
            }
        }

        Ok(Self {
            kind: kind.to_string(),
            subtype: subtype.to_string(),
            suffix: suffix.map(str::to_string),
        })
    }

    /// Subtype or suffix is `json`.
    pub fn is_json(&self) -> bool {
        self.subtype == "json" || self.suffix.as_deref() == Some("json")
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{}/{}+{}", self.kind, self.subtype, suffix),
            None => write!(f, "{}/{}", self.kind, self.subtype),
        }
    }
}

/// Whether a body of this content type can be checked by a JSON Schema.
///
/// # Errors
///
/// Returns [`MediaTypeError`] when the value is not a parseable media type,
/// which includes wildcards and the [`NOT_PROVIDED`] sentinel.
pub fn is_json_content_type(value: &str) -> Result<bool, MediaTypeError> {
    MediaType::parse(value).map(|m| m.is_json())
}

/// `*/*` or `type/*`.
pub fn is_wildcard(content_type: &str) -> bool {
    content_type == "*/*" || wildcard_type(content_type).is_some()
}

/// The `type` of a `type/*` wildcard made of lower-case letters.
pub fn wildcard_type(content_type: &str) -> Option<&str> {
    let kind = content_type.strip_suffix("/*")?;
    (!kind.is_empty() && kind.bytes().all(|b| b.is_ascii_lowercase())).then_some(kind)
}

/// Whether `content_type` is `<kind>/<something>`.
pub fn has_type(content_type: &str, kind: &str) -> bool {
    content_type
        .strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty())
}

fn validate_parameter(parameter: &str) -> Result<(), ()> {
    if parameter.is_empty() {
        return Ok(());
    }
    let (key, value) = parameter.split_once('=').ok_or(())?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || !key.chars().all(is_token_char) {
        return Err(());
    }
    let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if quoted || (!value.is_empty() && value.chars().all(is_token_char)) {
        Ok(())
    } else {
        Err(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+.^_`|~-".contains(c)
}

/// RFC 6838 restricted name: alphanumeric first, then up to 126 of
/// `!#$&^_-` (and `.` in subtypes).
fn is_restricted_name(name: &str, allow_dot: bool) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && name.len() <= 127
        && chars.all(|c| c.is_ascii_alphanumeric() || "!#$&^_-".contains(c) || (allow_dot && c == '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalents_without_charset() {
        let ct = ContentType::parse(Some("application/json"));
        assert_eq!(
            ct.equivalents(),
            vec!["application/json", "application/json; charset=utf-8"]
        );
        assert_eq!(ct.cache_key(), "application/json");
    }

    #[test]
    fn equivalents_with_charset() {
        let ct = ContentType::parse(Some("application/json; charset=utf-8"));
        assert_eq!(ct.media_type(), Some("application/json"));
        assert_eq!(ct.charset(), Some("charset=utf-8"));
        assert_eq!(
            ct.equivalents(),
            vec!["application/json", "application/json; charset=utf-8"]
        );
    }

    #[test]
    fn missing_header_has_no_equivalents() {
        let ct = ContentType::parse(None);
        assert!(ct.equivalents().is_empty());
        assert_eq!(ct.cache_key(), NOT_PROVIDED);
        assert_eq!(ct.response_key(), NOT_PROVIDED);
        assert!(!ct.is_provided());
    }

    #[test]
    fn multipart_boundary_is_stripped() {
        let a = ContentType::parse(Some("multipart/form-data; boundary=----abc"));
        let b = ContentType::parse(Some("multipart/form-data;boundary=xyz"));
        assert_eq!(a.cache_key(), "multipart/form-data");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.response_key(), "multipart/form-data");
    }

    #[test]
    fn response_key_keeps_parameters_for_non_multipart() {
        let ct = ContentType::parse(Some("application/json; charset=utf-8"));
        assert_eq!(ct.response_key(), "application/json; charset=utf-8");
    }

    #[test]
    fn media_type_detects_json_and_suffix() {
        assert!(is_json_content_type("application/json").unwrap());
        assert!(is_json_content_type("application/vnd.api+json; charset=utf-8").unwrap());
        assert!(is_json_content_type("application/problem+json").unwrap());
        assert!(!is_json_content_type("text/plain").unwrap());
    }

    #[test]
    fn media_type_rejects_wildcards_and_sentinel() {
        assert!(MediaType::parse("*/*").is_err());
        assert!(MediaType::parse("application/*").is_err());
        assert!(MediaType::parse(NOT_PROVIDED).is_err());
        assert!(MediaType::parse("application/json; charset").is_err());
    }

    #[test]
    fn media_type_display_round_trips() {
        let m = MediaType::parse("Application/VND.Foo+JSON").unwrap();
        assert_eq!(m.to_string(), "application/vnd.foo+json");
    }

    #[test]
    fn wildcard_helpers() {
        assert!(is_wildcard("*/*"));
        assert!(is_wildcard("image/*"));
        assert!(!is_wildcard("image/png"));
        assert_eq!(wildcard_type("application/*"), Some("application"));
        assert!(has_type("application/json", "application"));
        assert!(!has_type("applications/json", "application"));
        assert!(!has_type("application/", "application"));
    }
}
