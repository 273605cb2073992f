//! Verification key sets.
//!
//! A [`KeySet`] is an immutable snapshot of the public keys published by the
//! identity provider. It is built once per JWKS fetch and shared behind an
//! `Arc`; a refresh replaces the whole snapshot, so a verification in flight
//! always sees a consistent set.
//!
//! Keys that cannot be used for signature verification (symmetric keys,
//! encryption keys, unsupported curves, mismatched `alg`) are skipped with a
//! warning instead of failing the whole document.

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Raw JWKS document. Individual keys are parsed one at a time so a single
/// unrecognized entry does not reject the set.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// One public key usable for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: Option<String>,
    key: DecodingKey,
    algorithms: Vec<Algorithm>,
}

impl VerificationKey {
    /// Convert a JWK, returning why it was rejected on failure.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        if let Some(PublicKeyUse::Encryption) = jwk.common.public_key_use {
            return Err("key is marked for encryption".to_string());
        }

        let (key, family) = decoding_key(jwk)?;

        let algorithms = match &jwk.common.key_algorithm {
            None => family,
            Some(declared) => match signing_algorithm(declared) {
                Some(alg) if family.contains(&alg) => vec![alg],
                _ => return Err(format!("declared alg {declared:?} does not fit key type")),
            },
        };

        Ok(Self {
            kid: jwk.common.key_id.clone(),
            key,
            algorithms,
        })
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// Algorithms this key may verify. Never empty; all share one family.
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn supports(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Immutable set of verification keys indexed by key id.
#[derive(Debug, Default)]
pub struct KeySet {
    by_kid: HashMap<String, VerificationKey>,
    /// Keys published without a `kid`.
    unnamed: Vec<VerificationKey>,
}

impl KeySet {
    /// Parse a JWKS document (`{"keys": [...]}`).
    ///
    /// # Errors
    ///
    /// Fails only when the document itself is not a JWKS object. Unusable
    /// individual keys are skipped.
    pub fn from_jwks_bytes(body: &[u8]) -> Result<Self, serde_json::Error> {
        let document: JwksDocument = serde_json::from_slice(body)?;

        let keys = document.keys.into_iter().filter_map(|value| {
            let jwk: Jwk = match serde_json::from_value(value) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::warn!(target: "gateway.auth.keys", error = %e, "Skipping unparseable JWK");
                    return None;
                }
            };
            match VerificationKey::from_jwk(&jwk) {
                Ok(key) => Some(key),
                Err(reason) => {
                    tracing::warn!(
                        target: "gateway.auth.keys",
                        kid = ?jwk.common.key_id,
                        reason = %reason,
                        "Skipping unusable JWK"
                    );
                    None
                }
            }
        });

        Ok(Self::from_keys(keys))
    }

    /// Build a set from already converted keys. The first key wins on a
    /// duplicate `kid`.
    pub fn from_keys(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        let mut set = KeySet::default();
        for key in keys {
            match key.kid.clone() {
                Some(kid) => {
                    if set.by_kid.contains_key(&kid) {
                        tracing::warn!(target: "gateway.auth.keys", kid = %kid, "Ignoring duplicate kid in JWKS");
                        continue;
                    }
                    set.by_kid.insert(kid, key);
                }
                None => set.unnamed.push(key),
            }
        }
        set
    }

    /// Look up a key by id.
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.by_kid.get(kid)
    }

    /// Every key able to verify `alg`, used when a token carries no `kid`.
    pub fn candidates(&self, alg: Algorithm) -> impl Iterator<Item = &VerificationKey> {
        self.by_kid
            .values()
            .chain(self.unnamed.iter())
            .filter(move |key| key.supports(alg))
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.by_kid.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_kid.len() + self.unnamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the decoding key and the algorithm family for a JWK.
#[allow(unreachable_patterns)]
fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Vec<Algorithm>), String> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| format!("invalid RSA components: {e}"))?;
            Ok((key, RSA_ALGORITHMS.to_vec()))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let alg = match ec.curve {
                EllipticCurve::P256 => Algorithm::ES256,
                EllipticCurve::P384 => Algorithm::ES384,
                ref other => return Err(format!("unsupported EC curve {other:?}")),
            };
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| format!("invalid EC components: {e}"))?;
            Ok((key, vec![alg]))
        }
        AlgorithmParameters::OctetKeyPair(okp) => {
            if !matches!(okp.curve, EllipticCurve::Ed25519) {
                return Err(format!("unsupported OKP curve {:?}", okp.curve));
            }
            let key = DecodingKey::from_ed_components(&okp.x)
                .map_err(|e| format!("invalid Ed25519 key: {e}"))?;
            Ok((key, vec![Algorithm::EdDSA]))
        }
        AlgorithmParameters::OctetKey(_) => Err("symmetric keys are not accepted".to_string()),
        _ => Err("unsupported key type".to_string()),
    }
}

#[allow(unreachable_patterns)]
fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
