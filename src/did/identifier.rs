/// DID string and document consistency checks
///
/// Wire format: `did:<method>:<authority>:<identifier>` where method is
/// `[a-z]+`, authority is `[a-zA-Z0-9.-]+` and identifier is
/// `[a-zA-Z0-9._%-]+`. Everything here is pure and deterministic.
use crate::{did::document::DidDocument, error::ValidationError};

/// The three segments of a DID string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DidParts<'a> {
    pub method: &'a str,
    pub authority: &'a str,
    pub identifier: &'a str,
}

impl<'a> DidParts<'a> {
    /// Split and check a DID string
    pub fn parse(did: &'a str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidDid(format!("{}: {}", did, reason));

        let mut parts = did.split(':');
        if parts.next() != Some("did") {
            return Err(invalid("must start with 'did:'"));
        }

        let (method, authority, identifier) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(a), Some(i), None) => (m, a, i),
            _ => return Err(invalid("expected did:method:authority:identifier")),
        };

        if !is_method(method) {
            return Err(invalid("method must be lowercase letters"));
        }
        if !is_authority(authority) {
            return Err(invalid("authority contains invalid characters"));
        }
        if !is_identifier(identifier) {
            return Err(invalid("identifier contains invalid characters"));
        }

        Ok(Self {
            method,
            authority,
            identifier,
        })
    }
}

fn is_method(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase())
}

fn is_authority(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '-'))
}

/// Validate a DID string against its document
pub fn validate(did: &str, document: &DidDocument) -> Result<(), ValidationError> {
    DidParts::parse(did)?;

    if document.id != did {
        return Err(ValidationError::IdentifierMismatch {
            did: did.to_string(),
            document_id: document.id.clone(),
        });
    }

    if document.verification_method.is_empty() {
        return Err(ValidationError::MissingVerificationMethod);
    }

    for (index, vm) in document.verification_method.iter().enumerate() {
        let missing = if vm.id.trim().is_empty() {
            Some("id is required")
        } else if vm.controller.trim().is_empty() {
            Some("controller is required")
        } else if vm.public_key_base58.trim().is_empty() {
            Some("publicKeyBase58 is required")
        } else {
            None
        };
        if let Some(reason) = missing {
            return Err(ValidationError::InvalidVerificationMethod {
                index,
                reason: reason.to_string(),
            });
        }
    }

    if let Some(services) = &document.service {
        for (index, service) in services.iter().enumerate() {
            let missing = if service.id.trim().is_empty() {
                Some("id is required")
            } else if service.service_type.trim().is_empty() {
                Some("type is required")
            } else if service.service_endpoint.trim().is_empty() {
                Some("serviceEndpoint is required")
            } else {
                None
            };
            if let Some(reason) = missing {
                return Err(ValidationError::InvalidService {
                    index,
                    reason: reason.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Validate an Ethereum-style owner address (`0x` + 40 hex chars, any case)
pub fn validate_owner_address(address: &str) -> Result<(), ValidationError> {
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::InvalidOwnerAddress(address.to_string()))?;

    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(ValidationError::InvalidOwnerAddress(address.to_string()));
    }

    Ok(())
}

/// Owner addresses compare case-insensitively
pub fn same_owner(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::document::{Service, VerificationKeyType, VerificationMethod};

    const ALICE: &str = "did:web:example.com:alice";

    fn document(id: &str) -> DidDocument {
        DidDocument::new(
            id,
            VerificationMethod {
                id: format!("{}#key-1", id),
                key_type: VerificationKeyType::Ed25519VerificationKey2018,
                controller: id.to_string(),
                public_key_base58: "H3C2AVvLMv6gmMNam3uVAjZpfkcJCwDwnZn6z3wXmqPV".to_string(),
                public_key_jwk: None,
            },
        )
    }

    #[test]
    fn test_parse_parts() {
        let parts = DidParts::parse("did:web:example.com:alice_01%2F").unwrap();
        assert_eq!(parts.method, "web");
        assert_eq!(parts.authority, "example.com");
        assert_eq!(parts.identifier, "alice_01%2F");
    }

    #[test]
    fn test_rejects_malformed_dids() {
        for bad in [
            "",
            "web:example.com:alice",
            "did:web:alice",
            "did:Web:example.com:alice",
            "did:w3b:example.com:alice",
            "did:web:example_com:alice",
            "did:web:example.com:alice:extra",
            "did:web:example.com:al ice",
            "did:web::alice",
            "did:web:example.com:",
            "did:wéb:example.com:alice",
        ] {
            assert!(
                matches!(DidParts::parse(bad), Err(ValidationError::InvalidDid(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_valid_pair_round_trip() {
        assert!(validate(ALICE, &document(ALICE)).is_ok());
        // Idempotent
        assert!(validate(ALICE, &document(ALICE)).is_ok());
    }

    #[test]
    fn test_each_constraint_fails_independently() {
        // Malformed DID, consistent document
        let bad = "did:WEB:example.com:alice";
        assert!(matches!(
            validate(bad, &document(bad)),
            Err(ValidationError::InvalidDid(_))
        ));

        // Mismatched document id
        assert!(matches!(
            validate(ALICE, &document("did:web:example.com:bob")),
            Err(ValidationError::IdentifierMismatch { .. })
        ));

        // No verification methods
        let mut doc = document(ALICE);
        doc.verification_method.clear();
        assert_eq!(
            validate(ALICE, &doc),
            Err(ValidationError::MissingVerificationMethod)
        );
    }

    #[test]
    fn test_incomplete_service_rejected() {
        let mut doc = document(ALICE);
        doc.service = Some(vec![Service {
            id: format!("{}#hub", ALICE),
            service_type: "MessagingService".to_string(),
            service_endpoint: " ".to_string(),
        }]);
        assert!(matches!(
            validate(ALICE, &doc),
            Err(ValidationError::InvalidService { index: 0, .. })
        ));
    }

    #[test]
    fn test_owner_address() {
        assert!(validate_owner_address("0x52908400098527886E0F7030069857D2E4169EE7").is_ok());
        assert!(validate_owner_address("0xde709f2102306220921060314715629080e2fb77").is_ok());
        assert!(validate_owner_address("0x1234567890abcdef").is_err());
        assert!(validate_owner_address("52908400098527886E0F7030069857D2E4169EE7").is_err());
        assert!(validate_owner_address("0xZZ908400098527886E0F7030069857D2E4169EE7").is_err());
        assert!(same_owner(
            "0x52908400098527886E0F7030069857D2E4169EE7",
            "0x52908400098527886e0f7030069857d2e4169ee7"
        ));
    }
}
