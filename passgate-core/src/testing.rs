//! Software authenticator and key fixtures for tests.
//!
//! Builds real, correctly signed registration and assertion responses so
//! the verifiers can be exercised end to end without a browser. Enabled for
//! this crate's own tests and, through the `test-utils` feature, for
//! downstream crates.
//!
//! WARNING: the private keys here are published test fixtures.

use p256::ecdsa::signature::{RandomizedSigner, SignatureEncoding, Signer};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use sha2::{Digest, Sha256};

use crate::challenge::Challenge;
use crate::decode::{
    encode_attestation_object, AttestationFormat, AttestedCredentialData, AuthenticatorData,
    AuthenticatorFlags, CosePublicKey,
};
use crate::encoding::b64url_encode;
use crate::response::{
    AssertionResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    RegistrationResponse,
};
use crate::signature::CoseAlgorithm;
use ciborium::value::Value;

/// PKCS#8 RSA-2048 private key.
pub const TEST_RSA_2048_PEM: &str = include_str!("../testdata/rsa2048.pem");

/// PKCS#8 P-256 private key of the test attestation certificate.
pub const TEST_ATTESTATION_P256_PEM: &str = include_str!("../testdata/attestation_p256.pem");

/// Leaf attestation certificate (OU "Authenticator Attestation", CA:FALSE,
/// AAGUID extension set to [`TEST_ATTESTATION_AAGUID`]).
pub const TEST_ATTESTATION_CERT_DER: &[u8] = include_bytes!("../testdata/attestation_p256.der");

/// CA certificate over the same key; invalid as an attestation leaf.
pub const TEST_ATTESTATION_CA_DER: &[u8] = include_bytes!("../testdata/attestation_ca.der");

pub const TEST_ATTESTATION_AAGUID: [u8; 16] = [0x5a; 16];

enum KeyMaterial {
    P256(p256::ecdsa::SigningKey),
    Rsa(rsa::RsaPrivateKey),
    Ed25519(ed25519_dalek::SigningKey),
}

/// A signing key paired with the COSE algorithm it signs under.
pub struct TestKey {
    material: KeyMaterial,
    algorithm: CoseAlgorithm,
}

impl TestKey {
    /// Fresh random P-256 key.
    pub fn es256() -> Self {
        Self {
            material: KeyMaterial::P256(p256::ecdsa::SigningKey::random(&mut OsRng)),
            algorithm: CoseAlgorithm::Es256,
        }
    }

    /// Fresh random Ed25519 key.
    pub fn ed25519() -> Self {
        Self {
            material: KeyMaterial::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
            algorithm: CoseAlgorithm::EdDsa,
        }
    }

    /// The fixture RSA key for RS256.
    pub fn rs256() -> Self {
        Self::rsa_from_pem(TEST_RSA_2048_PEM, CoseAlgorithm::Rs256)
    }

    /// The fixture RSA key for PS256.
    pub fn ps256() -> Self {
        Self::rsa_from_pem(TEST_RSA_2048_PEM, CoseAlgorithm::Ps256)
    }

    pub fn rsa_from_pem(pem: &str, algorithm: CoseAlgorithm) -> Self {
        use rsa::pkcs8::DecodePrivateKey;
        let key = rsa::RsaPrivateKey::from_pkcs8_pem(pem).expect("fixture RSA key parses");
        Self {
            material: KeyMaterial::Rsa(key),
            algorithm,
        }
    }

    /// The key behind [`TEST_ATTESTATION_CERT_DER`].
    pub fn attestation() -> Self {
        use p256::pkcs8::DecodePrivateKey;
        let key = p256::ecdsa::SigningKey::from_pkcs8_pem(TEST_ATTESTATION_P256_PEM)
            .expect("fixture attestation key parses");
        Self {
            material: KeyMaterial::P256(key),
            algorithm: CoseAlgorithm::Es256,
        }
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> CosePublicKey {
        match &self.material {
            KeyMaterial::P256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                let mut x = [0u8; 32];
                let mut y = [0u8; 32];
                x.copy_from_slice(point.x().expect("uncompressed point has x"));
                y.copy_from_slice(point.y().expect("uncompressed point has y"));
                CosePublicKey::es256(x, y).expect("P-256 point encodes")
            }
            KeyMaterial::Rsa(key) => CosePublicKey::rsa(
                self.algorithm,
                key.n().to_bytes_be(),
                key.e().to_bytes_be(),
            )
            .expect("RSA key bound to an RSA algorithm"),
            KeyMaterial::Ed25519(key) => CosePublicKey::ed25519(key.verifying_key().to_bytes())
                .expect("Ed25519 key encodes"),
        }
    }

    /// Sign `data` in the wire format the verifiers expect (DER for ECDSA).
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        match (&self.material, self.algorithm) {
            (KeyMaterial::P256(key), _) => {
                let signature: p256::ecdsa::Signature = key.sign(data);
                signature.to_der().as_bytes().to_vec()
            }
            (KeyMaterial::Rsa(key), CoseAlgorithm::Ps256) => {
                rsa::pss::BlindedSigningKey::<Sha256>::new(key.clone())
                    .sign_with_rng(&mut OsRng, data)
                    .to_vec()
            }
            (KeyMaterial::Rsa(key), _) => rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone())
                .sign(data)
                .to_vec(),
            (KeyMaterial::Ed25519(key), _) => {
                use ed25519_dalek::Signer as _;
                key.sign(data).to_bytes().to_vec()
            }
        }
    }
}

/// How [`SoftAuthenticator::register`] should shape its response.
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub origin: String,
    /// RP ID hashed into authenticator data
    pub rp_id: String,
    pub ceremony_type: String,
    /// Flags besides AT, which is always set
    pub flags: u8,
    pub sign_count: u32,
    pub format: AttestationFormat,
    /// For `packed`: sign with the attestation certificate key
    pub packed_certificate: bool,
}

impl RegistrationOptions {
    fn base(origin: &str, format: AttestationFormat) -> Self {
        let rp_id = url::Url::parse(origin)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "example.com".to_string());
        Self {
            origin: origin.to_string(),
            rp_id,
            ceremony_type: "webauthn.create".into(),
            flags: AuthenticatorFlags::USER_PRESENT,
            sign_count: 0,
            format,
            packed_certificate: false,
        }
    }

    pub fn none(origin: &str) -> Self {
        Self::base(origin, AttestationFormat::None)
    }

    pub fn packed_self(origin: &str) -> Self {
        Self::base(origin, AttestationFormat::Packed)
    }

    pub fn packed_basic(origin: &str) -> Self {
        Self {
            packed_certificate: true,
            ..Self::base(origin, AttestationFormat::Packed)
        }
    }

    pub fn fido_u2f(origin: &str) -> Self {
        Self::base(origin, AttestationFormat::FidoU2f)
    }
}

/// How [`SoftAuthenticator::assert`] should shape its response.
#[derive(Debug, Clone)]
pub struct AssertionOptions {
    pub origin: String,
    pub rp_id: String,
    pub ceremony_type: String,
    pub flags: u8,
    pub sign_count: u32,
    pub user_handle: Option<Vec<u8>>,
}

impl AssertionOptions {
    pub fn new(origin: &str, sign_count: u32) -> Self {
        let base = RegistrationOptions::base(origin, AttestationFormat::None);
        Self {
            origin: base.origin,
            rp_id: base.rp_id,
            ceremony_type: "webauthn.get".into(),
            flags: AuthenticatorFlags::USER_PRESENT,
            sign_count,
            user_handle: None,
        }
    }
}

/// A software authenticator holding one credential.
pub struct SoftAuthenticator {
    key: TestKey,
    credential_id: Vec<u8>,
}

impl SoftAuthenticator {
    pub fn new(key: TestKey) -> Self {
        let mut credential_id = vec![0u8; 32];
        OsRng.fill_bytes(&mut credential_id);
        Self { key, credential_id }
    }

    pub fn key(&self) -> &TestKey {
        &self.key
    }

    pub fn credential_id(&self) -> Vec<u8> {
        self.credential_id.clone()
    }

    pub fn register(
        &self,
        challenge: &Challenge,
        options: &RegistrationOptions,
    ) -> RegistrationResponse {
        let client_data_json = client_data(&options.ceremony_type, challenge, &options.origin);
        let client_data_hash: [u8; 32] = Sha256::digest(&client_data_json).into();
        let rp_id_hash: [u8; 32] = Sha256::digest(options.rp_id.as_bytes()).into();

        let aaguid = if options.packed_certificate {
            TEST_ATTESTATION_AAGUID
        } else {
            [0u8; 16]
        };
        let attested =
            AttestedCredentialData::new(aaguid, self.credential_id.clone(), self.key.public_key())
                .expect("credential id fits");
        let auth_data = AuthenticatorData {
            rp_id_hash,
            flags: AuthenticatorFlags::from_bits(
                options.flags | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA,
            ),
            sign_count: options.sign_count,
            attested_credential: Some(attested.clone()),
            extensions: None,
        }
        .to_bytes();

        let signed_data = [auth_data.as_slice(), client_data_hash.as_slice()].concat();
        let statement = match &options.format {
            AttestationFormat::Packed if options.packed_certificate => vec![
                alg_entry(CoseAlgorithm::Es256),
                sig_entry(TestKey::attestation().sign(&signed_data)),
                x5c_entry(),
            ],
            AttestationFormat::Packed => vec![
                alg_entry(self.key.algorithm()),
                sig_entry(self.key.sign(&signed_data)),
            ],
            AttestationFormat::FidoU2f => {
                let data = u2f_verification_data(&rp_id_hash, &client_data_hash, &attested);
                vec![sig_entry(TestKey::attestation().sign(&data)), x5c_entry()]
            }
            _ => vec![],
        };

        RegistrationResponse {
            id: b64url_encode(&self.credential_id),
            raw_id: self.credential_id.clone(),
            credential_type: "public-key".into(),
            response: AuthenticatorAttestationResponse {
                client_data_json,
                attestation_object: encode_attestation_object(
                    &options.format,
                    statement,
                    &auth_data,
                )
                .expect("attestation object encodes"),
            },
        }
    }

    pub fn assert(&self, challenge: &Challenge, options: &AssertionOptions) -> AssertionResponse {
        let client_data_json = client_data(&options.ceremony_type, challenge, &options.origin);
        let client_data_hash: [u8; 32] = Sha256::digest(&client_data_json).into();

        let authenticator_data = AuthenticatorData {
            rp_id_hash: Sha256::digest(options.rp_id.as_bytes()).into(),
            flags: AuthenticatorFlags::from_bits(options.flags),
            sign_count: options.sign_count,
            attested_credential: None,
            extensions: None,
        }
        .to_bytes();

        let signed_data = [authenticator_data.as_slice(), client_data_hash.as_slice()].concat();
        AssertionResponse {
            id: b64url_encode(&self.credential_id),
            raw_id: self.credential_id.clone(),
            credential_type: "public-key".into(),
            response: AuthenticatorAssertionResponse {
                client_data_json,
                signature: self.key.sign(&signed_data),
                authenticator_data,
                user_handle: options.user_handle.clone(),
            },
        }
    }
}

/// `0x00 ‖ rpIdHash ‖ clientDataHash ‖ credentialId ‖ 0x04 ‖ x ‖ y`
pub fn u2f_verification_data(
    rp_id_hash: &[u8; 32],
    client_data_hash: &[u8; 32],
    credential: &AttestedCredentialData,
) -> Vec<u8> {
    let mut data = vec![0x00];
    data.extend_from_slice(rp_id_hash);
    data.extend_from_slice(client_data_hash);
    data.extend_from_slice(credential.credential_id());
    if let crate::decode::CoseKey::Ec2P256 { x, y } = credential.public_key().key() {
        data.push(0x04);
        data.extend_from_slice(x);
        data.extend_from_slice(y);
    }
    data
}

fn client_data(ceremony_type: &str, challenge: &Challenge, origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": ceremony_type,
        "challenge": challenge.encoded(),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

fn alg_entry(alg: CoseAlgorithm) -> (Value, Value) {
    (Value::Text("alg".into()), Value::Integer(alg.id().into()))
}

fn sig_entry(sig: Vec<u8>) -> (Value, Value) {
    (Value::Text("sig".into()), Value::Bytes(sig))
}

fn x5c_entry() -> (Value, Value) {
    (
        Value::Text("x5c".into()),
        Value::Array(vec![Value::Bytes(TEST_ATTESTATION_CERT_DER.to_vec())]),
    )
}

/// In-memory [`AccountStore`](crate::store::AccountStore) for tests.
#[cfg(feature = "service")]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: parking_lot::Mutex<MemoryState>,
    fail_next_counter_update: std::sync::atomic::AtomicBool,
}

#[cfg(feature = "service")]
#[derive(Debug, Default)]
struct MemoryState {
    /// credential id -> (user id, credential)
    credentials: std::collections::HashMap<Vec<u8>, (Vec<u8>, crate::credential::Credential)>,
    challenges: std::collections::HashMap<Vec<u8>, Challenge>,
}

#[cfg(feature = "service")]
impl MemoryStore {
    /// Make the next counter update report a lost race.
    pub fn fail_next_counter_update(&self) {
        self.fail_next_counter_update
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn challenge_count(&self) -> usize {
        self.inner.lock().challenges.len()
    }
}

#[cfg(feature = "service")]
#[async_trait::async_trait]
impl crate::store::AccountStore for MemoryStore {
    async fn lookup_credentials_by_user(
        &self,
        user_id: &[u8],
    ) -> crate::Result<Vec<crate::options::CredentialDescriptor>> {
        let state = self.inner.lock();
        let mut descriptors: Vec<_> = state
            .credentials
            .values()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, credential)| credential.descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }

    async fn lookup_credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> crate::Result<Option<crate::credential::Credential>> {
        Ok(self
            .inner
            .lock()
            .credentials
            .get(credential_id)
            .map(|(_, credential)| credential.clone()))
    }

    async fn atomic_update_counter(
        &self,
        credential_id: &[u8],
        expected_old: u32,
        new: u32,
    ) -> crate::Result<crate::store::CounterUpdate> {
        use crate::store::CounterUpdate;

        if self
            .fail_next_counter_update
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Ok(CounterUpdate::Conflict);
        }
        let mut state = self.inner.lock();
        match state.credentials.get_mut(credential_id) {
            Some((_, credential)) if credential.sign_count == expected_old => {
                credential.sign_count = new;
                Ok(CounterUpdate::Updated)
            }
            _ => Ok(CounterUpdate::Conflict),
        }
    }

    async fn store_challenge(&self, challenge: Challenge) -> crate::Result<()> {
        self.inner
            .lock()
            .challenges
            .insert(challenge.value.clone(), challenge);
        Ok(())
    }

    async fn consume_challenge(&self, value: &[u8]) -> crate::Result<Option<Challenge>> {
        let challenge = self.inner.lock().challenges.remove(value);
        Ok(challenge.filter(|c| !c.is_expired(chrono::Utc::now())))
    }

    async fn store_credential(
        &self,
        user_id: &[u8],
        credential: crate::credential::Credential,
    ) -> crate::Result<()> {
        match self.inner.lock().credentials.entry(credential.id.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => Err(crate::FidoError::Store(
                "credential ID is already registered".into(),
            )),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((user_id.to_vec(), credential));
                Ok(())
            }
        }
    }
}
