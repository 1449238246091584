//! Stored two-attribute presentation over a depth-13 revocation tree.
//!
//! Credential 1234502 (revocation block 4898) discloses attributes 8 and 9.
//! The public signals are the documented circuit outputs; a lookup hasher
//! reproduces the digests those signals commit to.

use std::collections::HashMap;

use heimdall_core::{
    AttributeValue, CoreResult, FieldElement, FieldHasher, Sha256FieldHasher,
};
use heimdall_proof::testing::SimulatedOracle;
use heimdall_proof::{checks, Presentation, PresentationKind, PresentationState, VerifyContext};

const FIXTURE: &str = include_str!("fixtures/mult_attribute_presentation.json");

const TYPE_HASH: &str =
    "6936141895847827773039820306011898011976769516186037164536571405943971461449";
const REVOCATION_ROOT: &str =
    "15093063772197360439942670764347374738539884999170539844715519374005555450641";
const REGISTRY_HASH: &str =
    "9037940188198198671970800601490910088551427182609940173326074139244911486789";
const LINK_BACK: &str =
    "16480984838845883908278887403998730505458370097797273028422755199897309800407";
const NAME_HASH: &str =
    "506091454650568783913867607798865803589405944288788850564754505122530534451";
const BIRTHDATE_HASH: &str =
    "3682517034118067363988451114871104117228742174037622396838237067437565515056";
const ISSUER_PK: [&str; 2] = [
    "5299619240641551281634865583518297030282874472190772894086521144482721001553",
    "16950150798460657717958625567821834550301663161624707787222815936182638968203",
];

fn fe(s: &str) -> FieldElement {
    s.parse().unwrap()
}

/// Known digests by input; anything else falls through to SHA-256.
struct LookupHasher {
    table: HashMap<Vec<FieldElement>, FieldElement>,
}

impl LookupHasher {
    fn fixture() -> Self {
        let attr = |v: &str| vec![AttributeValue::from(v).encode()];
        let mut table = HashMap::new();
        table.insert(attr("IdentityCard"), fe(TYPE_HASH));
        table.insert(attr("https://heimdall.example/revocation"), fe(REGISTRY_HASH));
        table.insert(attr("Alice"), fe(NAME_HASH));
        table.insert(attr("1990-01-01"), fe(BIRTHDATE_HASH));
        table.insert(
            vec![fe("1234"), fe(ISSUER_PK[0]), fe(ISSUER_PK[1])],
            fe(LINK_BACK),
        );
        Self { table }
    }
}

impl FieldHasher for LookupHasher {
    fn hash(&self, inputs: &[FieldElement]) -> CoreResult<FieldElement> {
        match self.table.get(inputs) {
            Some(out) => Ok(*out),
            None => Sha256FieldHasher.hash(inputs),
        }
    }
}

#[test]
fn fixture_restores_with_documented_signals() {
    let presentation = Presentation::from_json(FIXTURE).unwrap();
    assert_eq!(presentation.kind(), PresentationKind::MultiAttribute { count: 2 });
    assert_eq!(presentation.state(), PresentationState::Restored);

    let expected: Vec<FieldElement> = [
        TYPE_HASH,
        REVOCATION_ROOT,
        REGISTRY_HASH,
        "0",
        LINK_BACK,
        "0",
        "1234",
        "1699102553831",
        NAME_HASH,
        BIRTHDATE_HASH,
    ]
    .iter()
    .map(|s| fe(s))
    .collect();
    assert_eq!(presentation.public_signals(), expected.as_slice());

    // 1234502 / 252 = 4898, whose path bits (LSB first) are
    // [0,1,0,0,0,1,0,0,1,1,0,0,1]
    assert_eq!(1234502u64 / 252, 4898);
    let bits: Vec<u8> = (0..13).map(|k| ((4898u64 >> k) & 1) as u8).collect();
    assert_eq!(bits, vec![0, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0, 1]);
}

#[tokio::test]
async fn fixture_verifies_against_its_revocation_root() {
    let hasher = LookupHasher::fixture();
    let oracle = SimulatedOracle::new(Sha256FieldHasher);
    let presentation = Presentation::from_json(FIXTURE).unwrap();

    let ctx = VerifyContext::new(&oracle, &hasher).with_revocation_root(fe(REVOCATION_ROOT));
    let report = presentation.verify(&ctx).await;
    assert!(report.is_valid(), "failed: {:?}", report.failed_checks());
    assert!(report.check(checks::ISSUER_BINDING).unwrap().passed);
    assert!(report.check(checks::REVOCATION_PIN).unwrap().passed);
}

#[tokio::test]
async fn fixture_with_one_character_changed_is_rejected() {
    let hasher = LookupHasher::fixture();
    let oracle = SimulatedOracle::new(Sha256FieldHasher);

    let mut doc: serde_json::Value = serde_json::from_str(FIXTURE).unwrap();
    doc["output"]["content"]["attribute"][0] = serde_json::json!("Alicf");
    let presentation = Presentation::from_json(&doc.to_string()).unwrap();

    let ctx = VerifyContext::new(&oracle, &hasher).with_revocation_root(fe(REVOCATION_ROOT));
    let report = presentation.verify(&ctx).await;
    assert!(!report.is_valid());
    assert_eq!(report.failed_checks(), vec!["attribute[0]"]);
}

#[tokio::test]
async fn fixture_rejected_under_a_different_registry_snapshot() {
    let hasher = LookupHasher::fixture();
    let oracle = SimulatedOracle::new(Sha256FieldHasher);
    let mut presentation = Presentation::from_json(FIXTURE).unwrap();

    let ctx = VerifyContext::new(&oracle, &hasher).with_revocation_root(FieldElement::from_u64(1));
    let report = presentation.finalize(&ctx).await.unwrap();
    assert_eq!(report.failed_checks(), vec![checks::REVOCATION_PIN]);
    assert_eq!(presentation.state(), PresentationState::Rejected);
    assert_eq!(presentation.pinned_revocation_root(), Some(FieldElement::from_u64(1)));
}

#[tokio::test]
async fn fixture_without_any_root_fails_the_pin() {
    let hasher = LookupHasher::fixture();
    let oracle = SimulatedOracle::new(Sha256FieldHasher);
    let presentation = Presentation::from_json(FIXTURE).unwrap();

    let report = presentation.verify(&VerifyContext::new(&oracle, &hasher)).await;
    assert_eq!(report.failed_checks(), vec![checks::REVOCATION_PIN]);
}
