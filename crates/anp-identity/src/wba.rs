//! Lexical syntax of `did:wba` identifiers.
//!
//! ```text
//! did:wba:<host>[%3A<port>][:<path-segment>…]
//! ```
//!
//! DID syntax reserves `:` as its own separator, so the colon between host
//! and port is percent-encoded as `%3A`. Path segments map onto URL path
//! segments in order. The admitted alphabet is ASCII (hostname characters
//! and URL-unreserved segment characters); anything else is a syntax error,
//! which also makes byte equality of identifiers NFC-stable.

use std::fmt::{Display, Formatter};
use url::Url;

use anp_types::did::Did;

use crate::error::IdentityError;

const METHOD_PREFIX: &str = "did:wba:";

/// A parsed `did:wba` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WbaDid {
    host: String,
    port: Option<u16>,
    path_segments: Vec<String>,
}

impl WbaDid {
    /// Builds an identifier from its parts, validating the alphabet.
    ///
    /// `path` is slash-separated; an empty string means no path.
    pub fn new(host: &str, port: Option<u16>, path: &str) -> Result<Self, IdentityError> {
        if host.is_empty() || !host.chars().all(is_host_char) {
            return Err(IdentityError::DidSyntax(format!("invalid host: {host:?}")));
        }
        let path_segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if segment.chars().all(is_segment_char) {
                    Ok(segment.to_string())
                } else {
                    Err(IdentityError::DidSyntax(format!(
                        "invalid path segment: {segment:?}"
                    )))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            host: host.to_string(),
            port,
            path_segments,
        })
    }

    /// Parses a DID string into its `did:wba` parts.
    pub fn parse(did: &str) -> Result<Self, IdentityError> {
        let rest = did
            .strip_prefix(METHOD_PREFIX)
            .ok_or_else(|| IdentityError::DidSyntax(format!("missing {METHOD_PREFIX} prefix")))?;
        let mut segments = rest.split(':');
        let host_port = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::DidSyntax("empty host".into()))?;

        // The only percent-escape did:wba uses is %3A between host and port.
        let decoded = host_port.replace("%3A", ":").replace("%3a", ":");
        if decoded.contains('%') {
            return Err(IdentityError::DidSyntax(format!(
                "unexpected percent-escape in {host_port:?}"
            )));
        }
        let (host, port) = match decoded.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| IdentityError::DidSyntax(format!("invalid port: {port:?}")))?;
                (host.to_string(), Some(port))
            }
            None => (decoded, None),
        };

        if host.is_empty() || !host.chars().all(is_host_char) {
            return Err(IdentityError::DidSyntax(format!("invalid host: {host:?}")));
        }
        let mut path_segments = Vec::new();
        for segment in segments {
            if segment.is_empty() || !segment.chars().all(is_segment_char) {
                return Err(IdentityError::DidSyntax(format!(
                    "invalid path segment: {segment:?}"
                )));
            }
            path_segments.push(segment.to_string());
        }
        Ok(Self {
            host,
            port,
            path_segments,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Slash-joined path, empty when the identifier has no path segments.
    pub fn path(&self) -> String {
        self.path_segments.join("/")
    }

    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    /// The identifier as an opaque [`Did`].
    pub fn did(&self) -> Did {
        Did::new(self.to_string()).expect("constructed with did: prefix")
    }

    /// The HTTPS location of this identifier's DID document.
    ///
    /// Path segments come before `.well-known`; an identifier without a path
    /// uses `/.well-known/did.json` directly.
    pub fn document_url(&self) -> Url {
        let authority = match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        };
        let mut path = String::new();
        for segment in &self.path_segments {
            path.push('/');
            path.push_str(segment);
        }
        path.push_str("/.well-known/did.json");
        Url::parse(&format!("https://{authority}{path}")).expect("validated host and segments")
    }
}

impl Display for WbaDid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{METHOD_PREFIX}{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, "%3A{port}")?;
        }
        for segment in &self.path_segments {
            write!(f, ":{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for WbaDid {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WbaDid::parse(s)
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}
