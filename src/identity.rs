//! The agent's own identity: key material and DID document.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anp_crypto::{KeyKind, KeyPair, codec};
use anp_identity::WbaDid;
use anp_identity::proof::jws::JwsSigner;
use anp_types::ad::{AgentDescription, AgentInterface};
use anp_types::did::{Context, Did, DidDocument, MethodReference, VerificationMethod};

use crate::config::Config;

/// This agent's `did:wba` identity and signing keys.
///
/// The secp256k1 signing key persists across restarts (hex file next to the
/// config); the X25519 agreement key lives alongside it.
pub struct AgentIdentity {
    pub wba: WbaDid,
    pub did: Did,
    pub name: String,
    pub signing_key: Arc<KeyPair>,
    pub exchange_key: Arc<KeyPair>,
    pub service_authority: String,
}

impl AgentIdentity {
    pub fn load_or_generate(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let wba = WbaDid::new(&config.did_host, config.did_port, &config.did_path)?;
        let did = wba.did();
        let signing_key = load_or_generate_key(&config.key_file, KeyKind::Secp256k1)?;
        let exchange_key =
            load_or_generate_key(&config.key_file.with_extension("x25519.hex"), KeyKind::X25519)?;
        Ok(Self {
            wba,
            did,
            name: config.agent_name.clone(),
            signing_key: Arc::new(signing_key),
            exchange_key: Arc::new(exchange_key),
            service_authority: config.service_authority(),
        })
    }

    /// DID URL of the authentication method.
    pub fn verification_method(&self) -> String {
        format!("{}#key-1", self.did)
    }

    /// The agent's signing key as an AP2 / token JWS signer.
    pub fn jws_signer(&self) -> JwsSigner {
        match self.signing_key.as_ref() {
            KeyPair::Secp256k1(key) => JwsSigner::Es256k(key.clone()),
            // load_or_generate_key only produces secp256k1 signing keys.
            _ => unreachable!("agent signing key is secp256k1"),
        }
    }

    /// The DID document served at `/.well-known/did.json`.
    pub fn did_document(&self) -> DidDocument {
        let auth_method = VerificationMethod {
            id: self.verification_method(),
            method_type: "EcdsaSecp256k1VerificationKey2019".into(),
            controller: self.did.clone(),
            public_key_jwk: None,
            public_key_multibase: Some(codec::public_key_to_multibase(&self.signing_key.public())),
        };
        let agreement_method = VerificationMethod {
            id: format!("{}#key-x25519", self.did),
            method_type: "JsonWebKey2020".into(),
            controller: self.did.clone(),
            public_key_jwk: Some(codec::public_key_to_jwk(&self.exchange_key.public())),
            public_key_multibase: None,
        };
        DidDocument {
            context: Context::Many(vec!["https://www.w3.org/ns/did/v1".into()]),
            id: self.did.clone(),
            verification_method: vec![auth_method, agreement_method],
            authentication: vec![MethodReference::Reference(self.verification_method())],
            key_agreement: vec![MethodReference::Reference(format!(
                "{}#key-x25519",
                self.did
            ))],
            human_authorization: Vec::new(),
        }
    }

    /// The agent description served at `/ad.json`.
    pub fn agent_description(&self) -> AgentDescription {
        let base = format!("https://{}", self.service_authority);
        AgentDescription {
            context: serde_json::json!({"@vocab": "https://schema.org/"}),
            id: self.did.clone(),
            name: self.name.clone(),
            description: Some("Agent Network Protocol node".into()),
            interfaces: vec![AgentInterface {
                interface_type: "StructuredInterface".into(),
                protocol: "AP2/ANP".into(),
                url: format!("{base}/ap2/merchant"),
                description: Some("AP2 mandate endpoints".into()),
            }],
            informations: Vec::new(),
        }
    }
}

fn load_or_generate_key(path: &Path, kind: KeyKind) -> Result<KeyPair, Box<dyn std::error::Error>> {
    if path.exists() {
        let encoded = fs::read_to_string(path)?;
        let secret = hex::decode(encoded.trim())?;
        let key = KeyPair::from_secret_bytes(kind, &secret)?;
        tracing::info!(path = %path.display(), %kind, "loaded key");
        return Ok(key);
    }
    let key = KeyPair::generate(kind);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, hex::encode(key.secret_bytes()))?;
    tracing::info!(path = %path.display(), %kind, "generated key");
    Ok(key)
}

/// Convenience for tests and tooling: a throwaway identity with no on-disk
/// key material.
pub fn ephemeral_identity(host: &str, path: &str, name: &str) -> AgentIdentity {
    let wba = WbaDid::new(host, None, path).expect("static identifier");
    let did = wba.did();
    AgentIdentity {
        did,
        service_authority: host.to_string(),
        wba,
        name: name.to_string(),
        signing_key: Arc::new(KeyPair::generate(KeyKind::Secp256k1)),
        exchange_key: Arc::new(KeyPair::generate(KeyKind::X25519)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_of_a_fresh_identity_validates() {
        let identity = ephemeral_identity("didhost.cc", "agent", "test-agent");
        let document = identity.did_document();
        document.validate().unwrap();
        assert_eq!(document.id, identity.did);
        assert!(document.find_method("#key-1").is_some());
        assert!(document.find_method("#key-x25519").is_some());
    }

    #[test]
    fn description_points_at_the_ap2_interface() {
        let identity = ephemeral_identity("didhost.cc", "agent", "test-agent");
        let ad = identity.agent_description();
        assert_eq!(ad.interfaces.len(), 1);
        assert_eq!(ad.interfaces[0].protocol, "AP2/ANP");
        assert!(ad.interfaces[0].url.starts_with("https://didhost.cc"));
    }

    #[test]
    fn key_files_round_trip() {
        let dir = std::env::temp_dir().join("anp-agent-test-keys");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("agent-key.hex");
        let first = load_or_generate_key(&path, KeyKind::Secp256k1).unwrap();
        let second = load_or_generate_key(&path, KeyKind::Secp256k1).unwrap();
        assert_eq!(first.public(), second.public());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
