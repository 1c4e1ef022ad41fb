/// DID document model
use serde::{Deserialize, Serialize};

/// Default JSON-LD context for DID documents
pub const DEFAULT_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

fn default_context() -> Vec<String> {
    vec![DEFAULT_CONTEXT.to_string()]
}

/// Supported verification key suites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationKeyType {
    Ed25519VerificationKey2018,
    Secp256k1VerificationKey2018,
    RsaVerificationKey2018,
}

impl VerificationKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKeyType::Ed25519VerificationKey2018 => "Ed25519VerificationKey2018",
            VerificationKeyType::Secp256k1VerificationKey2018 => "Secp256k1VerificationKey2018",
            VerificationKeyType::RsaVerificationKey2018 => "RsaVerificationKey2018",
        }
    }
}

/// JSON Web Key material (all members optional)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Verification method entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: VerificationKeyType,
    pub controller: String,
    pub public_key_base58: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicKeyJwk>,
}

/// Service endpoint entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: String,
}

/// DID document as stored with each record version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context", default = "default_context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}

impl DidDocument {
    /// Minimal document with a single verification method
    pub fn new(id: impl Into<String>, verification_method: VerificationMethod) -> Self {
        Self {
            context: default_context(),
            id: id.into(),
            verification_method: vec![verification_method],
            authentication: None,
            assertion_method: None,
            key_agreement: None,
            capability_invocation: None,
            capability_delegation: None,
            service: None,
        }
    }

    /// Apply a partial update. Fields absent from the patch are kept.
    pub fn merged(&self, patch: &DocumentPatch) -> Self {
        let mut doc = self.clone();
        if let Some(context) = &patch.context {
            doc.context = context.clone();
        }
        if let Some(id) = &patch.id {
            doc.id = id.clone();
        }
        if let Some(vm) = &patch.verification_method {
            doc.verification_method = vm.clone();
        }
        if let Some(v) = &patch.authentication {
            doc.authentication = Some(v.clone());
        }
        if let Some(v) = &patch.assertion_method {
            doc.assertion_method = Some(v.clone());
        }
        if let Some(v) = &patch.key_agreement {
            doc.key_agreement = Some(v.clone());
        }
        if let Some(v) = &patch.capability_invocation {
            doc.capability_invocation = Some(v.clone());
        }
        if let Some(v) = &patch.capability_delegation {
            doc.capability_delegation = Some(v.clone());
        }
        if let Some(v) = &patch.service {
            doc.service = Some(v.clone());
        }
        doc
    }
}

/// Partial document used by owner updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}
