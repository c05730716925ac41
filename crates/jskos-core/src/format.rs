//! Output formats and content negotiation.
//!
//! The format table is fixed. Unknown format names are rejected with
//! [`Error::InvalidFormat`] before any registry is contacted.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Output representation of a looked-up item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Html,
    Debug,
    Json,
    Jskos,
    Jsonld,
    Ntriples,
    Turtle,
    Rdfxml,
}

/// Formats tried during Accept negotiation, in preference order, with the
/// media types that select them.
const NEGOTIATION: &[(Format, &[&str])] = &[
    (Format::Html, &["text/html", "application/xhtml+xml"]),
    (Format::Jsonld, &["application/ld+json", "application/json"]),
    (Format::Ntriples, &["application/n-triples", "text/plain"]),
    (
        Format::Turtle,
        &[
            "text/turtle",
            "application/turtle",
            "application/x-turtle",
            "text/n3",
            "text/rdf+n3",
            "application/rdf+n3",
        ],
    ),
    (Format::Rdfxml, &["application/rdf+xml", "text/rdf"]),
];

impl Format {
    /// MIME type of the serialized output; `None` for HTML views.
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            Self::Html | Self::Debug => None,
            Self::Json | Self::Jskos | Self::Jsonld => Some("application/json"),
            Self::Ntriples => Some("application/n-triples"),
            Self::Turtle => Some("text/turtle"),
            Self::Rdfxml => Some("application/rdf+xml"),
        }
    }

    /// Whether output needs an RDF serializer (anything but plain JSON).
    pub fn needs_rdf(self) -> bool {
        matches!(self.content_type(), Some(ct) if ct != "application/json")
    }

    /// Canonical format name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Debug => "debug",
            Self::Json => "json",
            Self::Jskos => "jskos",
            Self::Jsonld => "jsonld",
            Self::Ntriples => "ntriples",
            Self::Turtle => "turtle",
            Self::Rdfxml => "rdfxml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "html" => Ok(Self::Html),
            "debug" => Ok(Self::Debug),
            "json" => Ok(Self::Json),
            "jskos" => Ok(Self::Jskos),
            "jsonld" => Ok(Self::Jsonld),
            "ntriples" | "nt" => Ok(Self::Ntriples),
            "turtle" | "ttl" => Ok(Self::Turtle),
            "rdfxml" | "xml" => Ok(Self::Rdfxml),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

/// One entry of an Accept header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    main: String,
    sub: String,
    q: f32,
}

impl MediaRange {
    fn parse(part: &str) -> Option<Self> {
        let mut params = part.split(';');
        let (main, sub) = params.next()?.trim().split_once('/')?;
        let q = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|v| v.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        Some(Self {
            main: main.trim().to_ascii_lowercase(),
            sub: sub.trim().to_ascii_lowercase(),
            q,
        })
    }

    fn admits(&self, media_type: &str) -> bool {
        let Some((main, sub)) = media_type.split_once('/') else {
            return false;
        };
        self.q > 0.0
            && (self.main == "*" || self.main == main)
            && (self.sub == "*" || self.sub == sub)
    }
}

/// Pick a format from an Accept header.
///
/// Formats are tried in a fixed order and the first one with an admitted
/// media type wins. A missing or empty header admits everything.
pub fn negotiate(accept: Option<&str>) -> Option<Format> {
    let ranges: Vec<MediaRange> = accept
        .unwrap_or_default()
        .split(',')
        .filter_map(MediaRange::parse)
        .collect();
    if ranges.is_empty() {
        return NEGOTIATION.first().map(|(format, _)| *format);
    }
    NEGOTIATION
        .iter()
        .find(|(_, types)| types.iter().any(|t| ranges.iter().any(|r| r.admits(t))))
        .map(|(format, _)| *format)
}

/// Resolve the requested format: explicit `format` parameter first, then
/// Accept negotiation, then the default.
pub fn requested_format(format: Option<&str>, accept: Option<&str>) -> Result<Format> {
    match format {
        Some(name) => name.parse(),
        None => Ok(negotiate(accept).unwrap_or(Format::Jsonld)),
    }
}
