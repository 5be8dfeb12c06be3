//! Signing key material: generation, PEM load/dump and the capability trait
//! the issuer signs through.
//!
//! A key file holds exactly two PEM blocks, a PKCS#8 `PRIVATE KEY` and an SPKI
//! `PUBLIC KEY`. Anything else in the file is a configuration error.

use super::{jwks::Jwk, Error};
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{Signature, Signer, Verifier};
use rand::rngs::OsRng;
use secrecy::SecretSlice;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Asymmetric signing algorithms the issuer knows how to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    EdDSA,
}

impl Algorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EdDSA => "EdDSA",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signing key pair. Implementations are immutable once constructed; rotation
/// replaces the whole key.
pub trait SigningKey: fmt::Debug + Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Raw public key bytes.
    fn public_key(&self) -> Vec<u8>;

    /// Raw private key bytes.
    fn private_key(&self) -> SecretSlice<u8>;

    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// # Errors
    /// Returns `Error::InvalidSignature` if `signature` was not produced by this key over `message`.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), Error>;

    /// Public half of the key as a JWK entry.
    fn jwk(&self, kid: &str) -> Jwk;

    /// Write both PEM blocks to `path`.
    ///
    /// # Errors
    /// Returns an error if the key cannot be encoded or the file cannot be written.
    fn dump(&self, path: &Path) -> Result<(), Error>;

    /// Read a key pair from a PEM file written by [`SigningKey::dump`].
    ///
    /// # Errors
    /// Returns an error for unreadable files, malformed or duplicated blocks,
    /// unexpected block types, a missing half or mismatched halves.
    fn load(path: &Path) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519Key {
    signing: ed25519_dalek::SigningKey,
}

impl fmt::Debug for Ed25519Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Key")
            .field("public_key", &Base64UrlUnpadded::encode_string(&self.public_key()))
            .finish_non_exhaustive()
    }
}

impl Ed25519Key {
    /// Generate a fresh key pair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Parse the contents of a key file.
    ///
    /// # Errors
    /// See [`SigningKey::load`].
    pub fn from_pem(input: &str) -> Result<Self, Error> {
        let blocks =
            ::pem::parse_many(input).map_err(|err| Error::MalformedPem(err.to_string()))?;
        if blocks.is_empty() {
            return Err(Error::NoPemBlocks);
        }

        let mut private_der = None;
        let mut public_der = None;
        for block in &blocks {
            let (label, slot) = match block.tag() {
                PRIVATE_KEY_LABEL => (PRIVATE_KEY_LABEL, &mut private_der),
                PUBLIC_KEY_LABEL => (PUBLIC_KEY_LABEL, &mut public_der),
                other => return Err(Error::UnexpectedPemType(other.to_string())),
            };
            if slot.replace(block.contents()).is_some() {
                return Err(Error::DuplicatePemBlock(label));
            }
        }

        let private_der = private_der.ok_or(Error::MissingPemBlock(PRIVATE_KEY_LABEL))?;
        let public_der = public_der.ok_or(Error::MissingPemBlock(PUBLIC_KEY_LABEL))?;

        let signing = ed25519_dalek::SigningKey::from_pkcs8_der(private_der)
            .map_err(|_| Error::KeyDecode("private"))?;
        let verifying = ed25519_dalek::VerifyingKey::from_public_key_der(public_der)
            .map_err(|_| Error::KeyDecode("public"))?;

        if signing.verifying_key() != verifying {
            return Err(Error::KeyMismatch);
        }

        Ok(Self { signing })
    }

    /// Render the key pair as a private block followed by a public block.
    ///
    /// # Errors
    /// Returns an error if either half cannot be PEM-encoded.
    pub fn to_pem(&self) -> Result<String, Error> {
        let private_pem = self
            .signing
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| Error::KeyEncode(err.to_string()))?;
        let public_pem = self
            .signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| Error::KeyEncode(err.to_string()))?;

        let mut out = String::with_capacity(private_pem.len() + public_pem.len());
        out.push_str(&private_pem);
        out.push_str(&public_pem);
        Ok(out)
    }
}

impl SigningKey for Ed25519Key {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    fn public_key(&self) -> Vec<u8> {
        self.signing.verifying_key().to_bytes().to_vec()
    }

    fn private_key(&self) -> SecretSlice<u8> {
        SecretSlice::from(self.signing.to_bytes().to_vec())
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), Error> {
        let signature = Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
        self.signing
            .verifying_key()
            .verify(message, &signature)
            .map_err(|_| Error::InvalidSignature)
    }

    fn jwk(&self, kid: &str) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: Some("Ed25519".to_string()),
            x: Some(Base64UrlUnpadded::encode_string(&self.public_key())),
            alg: Some(self.algorithm().as_str().to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.to_string(),
        }
    }

    fn dump(&self, path: &Path) -> Result<(), Error> {
        let pem = self.to_pem()?;
        write_private_file(path, pem.as_bytes()).map_err(|source| Error::KeyFile {
            path: path.display().to_string(),
            source,
        })
    }

    fn load(path: &Path) -> Result<Self, Error> {
        let pem = fs::read_to_string(path).map_err(|source| Error::KeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&pem)
    }
}

/// Generate a new signing key with the default algorithm.
#[must_use]
pub fn generate() -> Arc<dyn SigningKey> {
    Arc::new(Ed25519Key::generate())
}

/// Load a signing key with the default algorithm from `path`.
///
/// # Errors
/// See [`SigningKey::load`].
pub fn load(path: &Path) -> Result<Arc<dyn SigningKey>, Error> {
    Ok(Arc::new(Ed25519Key::load(path)?))
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
