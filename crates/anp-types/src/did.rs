//! `did:wba` identifiers, DID documents, and verification methods.
//!
//! The identifier itself is an opaque, case-preserving string compared by
//! byte equality. Lexical parsing of the `did:wba` method syntax (host, port,
//! path segments) lives in `anp-identity`; this module owns the document
//! model that resolution produces.
//!
//! A DID document is JSON-LD. Usage sets (`authentication`, `keyAgreement`,
//! `humanAuthorization`) reference verification methods either by DID URL or
//! by embedding the method inline. [`DidDocument::validate`] enforces the
//! structural invariants every resolved document must satisfy before any key
//! material is trusted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// The JSON-LD context every DID document must carry.
pub const DID_CONTEXT_V1: &str = "https://www.w3.org/ns/did/v1";

/// A decentralized identifier.
///
/// Opaque and case-preserving; equality is byte equality. Construction only
/// checks the generic `did:` scheme prefix — method-specific syntax is
/// enforced where the method is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Wraps a string after checking the `did:` scheme prefix.
    pub fn new(value: impl Into<String>) -> Result<Self, DocumentError> {
        let value = value.into();
        if !value.starts_with("did:") {
            return Err(DocumentError::NotADid(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Did {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Did {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Did::new(s)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors raised by document validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("not a DID: {0}")]
    NotADid(String),
    #[error("document @context is missing {DID_CONTEXT_V1}")]
    MissingDidContext,
    #[error("verification method {0} does not belong to the document subject")]
    ForeignMethodId(String),
    #[error("duplicate verification method fragment: {0}")]
    DuplicateFragment(String),
    #[error("usage set references unknown verification method {0}")]
    DanglingReference(String),
}

/// A JSON Web Key as embedded in `JsonWebKey2020` verification methods.
///
/// Only the public parameters ANP consumes are modeled; anything else a peer
/// includes is rejected by the key decoder, not the document parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type: `EC` or `OKP`.
    pub kty: String,
    /// Curve: `secp256k1`, `P-256`, `Ed25519`, or `X25519`.
    pub crv: String,
    /// Base64url x coordinate (or raw key for OKP).
    pub x: String,
    /// Base64url y coordinate, present for EC keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// A single verification method entry.
///
/// The key material is carried in exactly one of `publicKeyJwk` or
/// `publicKeyMultibase` depending on `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// DID URL of this method, `<did>#<fragment>`.
    pub id: String,
    /// Method type, e.g. `JsonWebKey2020`, `EcdsaSecp256k1VerificationKey2019`,
    /// `Ed25519VerificationKey2020`.
    #[serde(rename = "type")]
    pub method_type: String,
    /// The DID that controls this key.
    pub controller: Did,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}

impl VerificationMethod {
    /// The `#fragment` portion of the method id, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.id.split_once('#').map(|(_, fragment)| fragment)
    }
}

/// An entry in a usage set: either a DID URL reference or an embedded method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodReference {
    Reference(String),
    Embedded(VerificationMethod),
}

/// `@context` is a single IRI or a sequence of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Context {
    One(String),
    Many(Vec<String>),
}

impl Context {
    pub fn contains(&self, iri: &str) -> bool {
        match self {
            Context::One(single) => single == iri,
            Context::Many(many) => many.iter().any(|c| c == iri),
        }
    }
}

/// A resolved DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Context,
    pub id: Did,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default)]
    pub authentication: Vec<MethodReference>,
    #[serde(default)]
    pub key_agreement: Vec<MethodReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub human_authorization: Vec<MethodReference>,
}

impl DidDocument {
    /// Checks the structural invariants of a resolved document:
    /// the DID context is present, every method id belongs to the subject,
    /// fragments are unique, and every usage-set reference resolves.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if !self.context.contains(DID_CONTEXT_V1) {
            return Err(DocumentError::MissingDidContext);
        }
        let mut fragments = HashSet::new();
        for method in self.all_methods() {
            if !method.id.starts_with(self.id.as_str()) {
                return Err(DocumentError::ForeignMethodId(method.id.clone()));
            }
            if let Some(fragment) = method.fragment() {
                if !fragments.insert(fragment.to_string()) {
                    return Err(DocumentError::DuplicateFragment(fragment.to_string()));
                }
            }
        }
        for reference in self.all_references() {
            if self.find_method(reference).is_none() {
                return Err(DocumentError::DanglingReference(reference.to_string()));
            }
        }
        Ok(())
    }

    /// Looks up a verification method by DID URL or bare `#fragment`,
    /// searching `verificationMethod` and methods embedded in usage sets.
    pub fn find_method(&self, url: &str) -> Option<&VerificationMethod> {
        let absolute = if url.starts_with('#') {
            format!("{}{}", self.id, url)
        } else {
            url.to_string()
        };
        self.all_methods().find(|method| method.id == absolute)
    }

    fn all_methods(&self) -> impl Iterator<Item = &VerificationMethod> {
        self.verification_method.iter().chain(
            self.authentication
                .iter()
                .chain(self.key_agreement.iter())
                .chain(self.human_authorization.iter())
                .filter_map(|entry| match entry {
                    MethodReference::Embedded(method) => Some(method),
                    MethodReference::Reference(_) => None,
                }),
        )
    }

    fn all_references(&self) -> impl Iterator<Item = &str> {
        self.authentication
            .iter()
            .chain(self.key_agreement.iter())
            .chain(self.human_authorization.iter())
            .filter_map(|entry| match entry {
                MethodReference::Reference(url) => Some(url.as_str()),
                MethodReference::Embedded(_) => None,
            })
    }
}
