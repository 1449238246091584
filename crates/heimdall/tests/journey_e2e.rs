//! End-to-end journeys through the issuer, holder and verifier workflows.
//!
//! Journey 1: Issuer creates a registry, holder presents, verifier accepts
//! Journey 2: Tampered presentations are rejected by the matching check
//! Journey 3: Registry changes after presentation fail the revocation pin
//! Journey 4: Holder requests the backend cannot serve are refused early

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heimdall::{PresentRequest, RootConfig, RootError, RootState, VerifyRequest};
use heimdall_core::{AttributeValue, FieldElement, Sha256FieldHasher};
use heimdall_cred::{Credential, IssuerSignature, RevocationRegistry};
use heimdall_proof::testing::{DeterministicSigner, SimulatedOracle};
use heimdall_proof::{checks, PresentationError, PresentationKind, PresentationState};

const CREDENTIAL_ID: u64 = 1_234_502;
// 2100-01-01T00:00:00Z
const FAR_EXPIRATION: u64 = 4_102_444_800_000;

struct Journey {
    _dir: tempfile::TempDir,
    root: PathBuf,
    oracle: Arc<SimulatedOracle>,
    state: RootState,
}

impl Journey {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let mut config = RootConfig::default();
        config.registry.dir = root.join("revocation");
        config.oracle.timeout_secs = 30;

        let oracle = Arc::new(SimulatedOracle::new(Sha256FieldHasher));
        let state =
            RootState::with_backends(config, oracle.clone(), Arc::new(Sha256FieldHasher)).unwrap();
        state.create_registry(None, false).unwrap();

        Self {
            _dir: dir,
            root,
            oracle,
            state,
        }
    }

    fn write_credential(&self, id: u64, expiration: u64) -> PathBuf {
        let attrs: Vec<AttributeValue> = [
            id.to_string(),
            "IdentityCard".into(),
            "11".into(),
            "12".into(),
            "https://heimdall.example/revocation".into(),
            expiration.to_string(),
            "0".into(),
            "0".into(),
            "Alice".into(),
            "1990-01-01".into(),
            "Springfield".into(),
            "Engineer".into(),
            "A+".into(),
        ]
        .into_iter()
        .map(AttributeValue::from)
        .collect();
        let credential = Credential {
            attributes: attrs,
            root: None,
            signature: IssuerSignature {
                r8: [FieldElement::from_u64(1), FieldElement::from_u64(2)],
                s: FieldElement::from_u64(3),
                pk: [FieldElement::from_u64(4), FieldElement::from_u64(5)],
            },
        };
        let path = self.root.join(format!("credential-{id}.json"));
        std::fs::write(&path, serde_json::to_string_pretty(&credential).unwrap()).unwrap();
        path
    }

    fn request(&self, credential: &Path, indices: &[usize]) -> PresentRequest {
        PresentRequest {
            credential: credential.to_path_buf(),
            indices: indices.to_vec(),
            challenge: FieldElement::from_u64(1234),
            expiration_days: Some(30),
            secret_key: None,
            disclose_issuer_pk: false,
            registry_dir: None,
        }
    }

    async fn present_to_file(&self, indices: &[usize], name: &str) -> PathBuf {
        let credential = self.write_credential(CREDENTIAL_ID, FAR_EXPIRATION);
        let presentation = self
            .state
            .present(&self.request(&credential, indices))
            .await
            .unwrap();
        let path = self.root.join(name);
        heimdall::storage::write_presentation(&path, &presentation).unwrap();
        path
    }

    fn verify_request(&self, presentation: &Path) -> VerifyRequest {
        VerifyRequest {
            presentation: presentation.to_path_buf(),
            ..VerifyRequest::default()
        }
    }

    fn edit(&self, source: &Path, name: &str, edit: impl FnOnce(&mut serde_json::Value)) -> PathBuf {
        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(source).unwrap()).unwrap();
        edit(&mut doc);
        let path = self.root.join(name);
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }
}

// ============================================================================
// Journey 1: present and verify
// ============================================================================

#[tokio::test]
async fn test_journey_present_and_verify() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[8, 9], "presentation.json").await;

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored["type"], "mult-attribute");
    assert_eq!(stored["output"]["content"]["attribute"][0], "Alice");
    assert_eq!(stored["output"]["content"]["attribute"][1], "1990-01-01");
    assert_eq!(stored["publicSignals"].as_array().unwrap().len(), 10);
    assert!(stored.get("privateInput").is_none());

    let credential = journey.root.join(format!("credential-{CREDENTIAL_ID}.json"));
    let mut request = journey.verify_request(&path);
    request.credential = Some(credential);
    let (presentation, report) = journey.state.verify(&request).await.unwrap();

    assert!(report.is_valid(), "failed: {:?}", report.failed_checks());
    assert_eq!(presentation.state(), PresentationState::Verified);
    assert_eq!(presentation.kind(), PresentationKind::MultiAttribute { count: 2 });
    assert_eq!(report.positions, Some(vec![Some(8), Some(9)]));
    assert_eq!(presentation.output().meta.revoked, Some(false));
    assert_eq!(journey.oracle.prove_calls(), 1);
}

#[tokio::test]
async fn test_journey_single_attribute() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[10], "single.json").await;

    let (presentation, report) = journey
        .state
        .verify(&journey.verify_request(&path))
        .await
        .unwrap();
    assert!(report.is_valid(), "failed: {:?}", report.failed_checks());
    assert_eq!(presentation.kind(), PresentationKind::Attribute);
    assert_eq!(presentation.public_signals().len(), 9);
    assert_eq!(
        presentation.output().content.attribute.values(),
        &[AttributeValue::from("Springfield")]
    );
}

#[tokio::test]
async fn test_journey_disclosure_order_is_kept() {
    let journey = Journey::new();
    let forward = journey.present_to_file(&[8, 9], "forward.json").await;
    let reverse = journey.present_to_file(&[9, 8], "reverse.json").await;

    let (a, report_a) = journey
        .state
        .verify(&journey.verify_request(&forward))
        .await
        .unwrap();
    let (b, report_b) = journey
        .state
        .verify(&journey.verify_request(&reverse))
        .await
        .unwrap();
    assert!(report_a.is_valid());
    assert!(report_b.is_valid());

    let values_a = a.output().content.attribute.values().to_vec();
    let mut values_b = b.output().content.attribute.values().to_vec();
    values_b.reverse();
    assert_eq!(values_a, values_b);
    assert_eq!(a.public_signals()[8], b.public_signals()[9]);
    assert_eq!(a.public_signals()[9], b.public_signals()[8]);
}

#[tokio::test]
async fn test_journey_holder_key_binding() {
    let journey = Journey::new();
    let credential = journey.write_credential(CREDENTIAL_ID, FAR_EXPIRATION);
    let key = journey.root.join("holder.sk");
    std::fs::write(&key, "424242\n").unwrap();

    let mut request = journey.request(&credential, &[8]);
    request.secret_key = Some(key);
    request.disclose_issuer_pk = true;

    // Without a signer the key cannot be used
    assert!(matches!(
        journey.state.present(&request).await,
        Err(RootError::Config(_))
    ));
    assert_eq!(journey.oracle.prove_calls(), 0);

    let signed = RootState::with_backends(
        journey.state.config.clone(),
        journey.oracle.clone(),
        Arc::new(Sha256FieldHasher),
    )
    .unwrap()
    .with_signer(Arc::new(DeterministicSigner));
    let presentation = signed.present(&request).await.unwrap();
    let path = journey.root.join("bound.json");
    heimdall::storage::write_presentation(&path, &presentation).unwrap();

    let (_, report) = signed.verify(&journey.verify_request(&path)).await.unwrap();
    assert!(report.is_valid(), "failed: {:?}", report.failed_checks());
    assert!(report.check(checks::ISSUER_BINDING).unwrap().passed);
}

// ============================================================================
// Journey 2: tampering
// ============================================================================

#[tokio::test]
async fn test_journey_every_meta_field_is_bound() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[8, 9], "presentation.json").await;

    let tampered: [(&str, serde_json::Value, &str); 8] = [
        ("type", "Passport".into(), checks::TYPE),
        ("revocationRegistry", "https://evil.example".into(), checks::REVOCATION_REGISTRY),
        ("revocationRoot", "1".into(), checks::REVOCATION_ROOT),
        ("revoked", true.into(), checks::REVOKED),
        ("delegatable", true.into(), checks::DELEGATABLE),
        ("linkBack", "1".into(), checks::LINK_BACK),
        ("challenge", "1235".into(), checks::CHALLENGE),
        ("expiration", "4102444800000".into(), checks::EXPIRATION),
    ];

    for (field, value, check) in tampered {
        let edited = journey.edit(&path, &format!("tampered-{field}.json"), |doc| {
            doc["output"]["meta"][field] = value;
        });
        let (presentation, report) = journey
            .state
            .verify(&journey.verify_request(&edited))
            .await
            .unwrap();
        assert_eq!(report.failed_checks(), vec![check], "tampered {field}");
        assert_eq!(presentation.state(), PresentationState::Rejected);
    }
}

#[tokio::test]
async fn test_journey_disclosed_issuer_key_cannot_be_withheld() {
    let journey = Journey::new();
    let credential = journey.write_credential(CREDENTIAL_ID, FAR_EXPIRATION);
    let mut request = journey.request(&credential, &[8, 9]);
    request.disclose_issuer_pk = true;
    let presentation = journey.state.present(&request).await.unwrap();
    let path = journey.root.join("disclosed.json");
    heimdall::storage::write_presentation(&path, &presentation).unwrap();

    let (_, report) = journey.state.verify(&journey.verify_request(&path)).await.unwrap();
    assert!(report.check(checks::ISSUER_BINDING).unwrap().passed);

    let stripped = journey.edit(&path, "stripped.json", |doc| {
        doc["output"]["meta"].as_object_mut().unwrap().remove("issuerPK");
    });
    let (presentation, report) = journey
        .state
        .verify(&journey.verify_request(&stripped))
        .await
        .unwrap();
    assert_eq!(report.failed_checks(), vec![checks::ISSUER_BINDING]);
    assert_eq!(presentation.state(), PresentationState::Rejected);

    let swapped = journey.edit(&path, "swapped-pk.json", |doc| {
        doc["output"]["meta"]["issuerPK"] = serde_json::json!(["4", "6"]);
    });
    let (_, report) = journey
        .state
        .verify(&journey.verify_request(&swapped))
        .await
        .unwrap();
    assert_eq!(report.failed_checks(), vec![checks::ISSUER_BINDING]);

    // With every trace of the disclosure removed, a verifier that trusts a
    // specific issuer still checks the link-back against it
    let erased = journey.edit(&path, "erased.json", |doc| {
        doc.as_object_mut().unwrap().remove("issuerPKDisclosed");
        doc["output"]["meta"].as_object_mut().unwrap().remove("issuerPK");
    });
    let mut trusted = journey.verify_request(&erased);
    trusted.issuer_pk = Some([FieldElement::from_u64(4), FieldElement::from_u64(5)]);
    let (_, report) = journey.state.verify(&trusted).await.unwrap();
    assert!(report.is_valid(), "failed: {:?}", report.failed_checks());
    assert!(report.check(checks::ISSUER_BINDING).unwrap().passed);

    trusted.issuer_pk = Some([FieldElement::from_u64(5), FieldElement::from_u64(4)]);
    let (_, report) = journey.state.verify(&trusted).await.unwrap();
    assert_eq!(report.failed_checks(), vec![checks::ISSUER_BINDING]);
}

#[tokio::test]
async fn test_journey_disclosed_content_is_bound() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[8, 9], "presentation.json").await;

    for (i, value) in ["Blice", "1990-01-02"].into_iter().enumerate() {
        let edited = journey.edit(&path, &format!("content-{i}.json"), |doc| {
            doc["output"]["content"]["attribute"][i] = value.into();
        });
        let (_, report) = journey
            .state
            .verify(&journey.verify_request(&edited))
            .await
            .unwrap();
        assert_eq!(report.failed_checks(), vec![checks::attribute(i)]);
    }

    let swapped = journey.edit(&path, "content-swapped.json", |doc| {
        doc["output"]["content"]["attribute"] = serde_json::json!(["1990-01-01", "Alice"]);
    });
    let (_, report) = journey
        .state
        .verify(&journey.verify_request(&swapped))
        .await
        .unwrap();
    assert_eq!(
        report.failed_checks(),
        vec![checks::attribute(0), checks::attribute(1)]
    );
}

#[tokio::test]
async fn test_journey_public_signals_are_bound_by_the_proof() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[8, 9], "presentation.json").await;

    let edited = journey.edit(&path, "signals.json", |doc| {
        doc["publicSignals"][7] = "4102444800000".into();
        doc["output"]["meta"]["expiration"] = "4102444800000".into();
    });
    let (_, report) = journey
        .state
        .verify(&journey.verify_request(&edited))
        .await
        .unwrap();
    assert_eq!(report.failed_checks(), vec![checks::PROOF]);

    let truncated = journey.edit(&path, "truncated.json", |doc| {
        doc["publicSignals"].as_array_mut().unwrap().pop();
    });
    let (_, report) = journey
        .state
        .verify(&journey.verify_request(&truncated))
        .await
        .unwrap();
    assert!(report.failed_checks().contains(&checks::PUBLIC_SIGNALS));
    assert!(!report.is_valid());
}

// ============================================================================
// Journey 3: registry changes
// ============================================================================

#[tokio::test]
async fn test_journey_revocation_pinning() {
    let journey = Journey::new();
    let store = journey.state.registry_store(None);
    let path = journey.present_to_file(&[8, 9], "presentation.json").await;
    let presented_root = store.read_root().unwrap();

    // Another credential is revoked after the presentation was made
    let update = journey.state.revoke(77, None, None).unwrap();
    assert!(update.changed);
    assert_ne!(update.root, presented_root);

    let (presentation, report) = journey
        .state
        .verify(&journey.verify_request(&path))
        .await
        .unwrap();
    assert_eq!(report.failed_checks(), vec![checks::REVOCATION_PIN]);
    assert_eq!(presentation.pinned_revocation_root(), Some(update.root));

    let mut pinned = journey.verify_request(&path);
    pinned.revocation_root = Some(presented_root);
    let (_, report) = journey.state.verify(&pinned).await.unwrap();
    assert!(report.is_valid());
}

#[tokio::test]
async fn test_journey_registry_update_touches_one_leaf() {
    let journey = Journey::new();
    let store = journey.state.registry_store(None);
    let before = store.read(&Sha256FieldHasher).unwrap();

    journey.state.revoke(CREDENTIAL_ID, None, None).unwrap();
    let after = store.read(&Sha256FieldHasher).unwrap();

    let changed: Vec<usize> = before
        .tree()
        .leaves()
        .iter()
        .zip(after.tree().leaves())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(changed, vec![RevocationRegistry::position(CREDENTIAL_ID) as usize]);
    assert!(after.is_revoked(CREDENTIAL_ID).unwrap());
    assert!(!after.is_revoked(CREDENTIAL_ID + 1).unwrap());
    assert_eq!(store.read_root().unwrap(), after.root());
}

#[tokio::test]
async fn test_journey_revoked_credential_is_reported() {
    let journey = Journey::new();
    journey.state.revoke(CREDENTIAL_ID, None, None).unwrap();

    let path = journey.present_to_file(&[8], "revoked.json").await;
    let (presentation, report) = journey
        .state
        .verify(&journey.verify_request(&path))
        .await
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(presentation.output().meta.revoked, Some(true));
}

// ============================================================================
// Journey 4: refused requests
// ============================================================================

#[tokio::test]
async fn test_journey_too_many_disclosures_never_reach_the_oracle() {
    let journey = Journey::new();
    let credential = journey.write_credential(CREDENTIAL_ID, FAR_EXPIRATION);

    let err = journey
        .state
        .present(&journey.request(&credential, &[8, 9, 10, 11, 12]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RootError::Presentation(PresentationError::UnsupportedDisclosureCount {
            requested: 5,
            max: 4
        })
    ));
    assert_eq!(journey.oracle.prove_calls(), 0);
}

#[tokio::test]
async fn test_journey_expiration_capped_by_credential() {
    let journey = Journey::new();
    let soon = heimdall_core::expiration_in_days(10);
    let credential = journey.write_credential(CREDENTIAL_ID, soon);

    let err = journey
        .state
        .present(&journey.request(&credential, &[8]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RootError::Presentation(PresentationError::ExpirationExceedsCredential { .. })
    ));

    let mut request = journey.request(&credential, &[8]);
    request.expiration_days = None;
    let presentation = journey.state.present(&request).await.unwrap();
    assert_eq!(
        presentation.output().meta.expiration,
        Some(FieldElement::from_u64(soon))
    );
}

#[tokio::test]
async fn test_journey_credential_outside_registry() {
    let journey = Journey::new();
    // 8192 blocks of 252 identifiers
    let credential = journey.write_credential(8192 * 252, FAR_EXPIRATION);

    let err = journey
        .state
        .present(&journey.request(&credential, &[8]))
        .await
        .unwrap_err();
    assert!(matches!(err, RootError::Presentation(_)));
    assert_eq!(journey.oracle.prove_calls(), 0);
}

#[tokio::test]
async fn test_journey_missing_registry_root() {
    let journey = Journey::new();
    let path = journey.present_to_file(&[8], "presentation.json").await;

    let mut request = journey.verify_request(&path);
    request.registry_dir = Some(journey.root.join("nowhere"));
    assert!(matches!(
        journey.state.verify(&request).await,
        Err(RootError::MissingFile(_))
    ));
}
