//! ECDSA P-256 signing of export binaries

use crate::core::export::format::{
    encode_signature_list, write_artifact, SignatureInfo, TekSignature, TekSignatureList,
    EXPORT_SIG_FILE_NAME,
};
use crate::domain::{Result, TekError};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use std::fs;
use std::path::{Path, PathBuf};

/// Signs export binaries with one P-256 key
pub struct ExportSigner {
    signing_key: SigningKey,
    signature_info: SignatureInfo,
}

impl ExportSigner {
    pub fn new(signing_key: SigningKey, signature_info: SignatureInfo) -> Self {
        Self {
            signing_key,
            signature_info,
        }
    }

    /// Parses a PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str, signature_info: SignatureInfo) -> Result<Self> {
        let signing_key = match SigningKey::from_pkcs8_pem(pem) {
            Ok(key) => key,
            Err(pkcs8_error) => SecretKey::from_sec1_pem(pem)
                .map(SigningKey::from)
                .map_err(|sec1_error| {
                    TekError::Signing(format!(
                        "Not a P-256 private key (PKCS#8: {pkcs8_error}; SEC1: {sec1_error})"
                    ))
                })?,
        };
        Ok(Self::new(signing_key, signature_info))
    }

    /// Loads the signing key from a PEM file
    ///
    /// # Errors
    ///
    /// Returns [`TekError::Signing`] when the file is missing or holds no
    /// usable key.
    pub fn from_pem_file(path: impl AsRef<Path>, signature_info: SignatureInfo) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|e| {
            TekError::Signing(format!(
                "Failed to read signing key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&pem, signature_info)
    }

    pub fn signature_info(&self) -> &SignatureInfo {
        &self.signature_info
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key().clone()
    }

    /// ASN.1 DER encoded ECDSA-SHA256 signature over `bytes`
    pub fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        let signature: DerSignature = self.signing_key.sign(bytes);
        signature.as_bytes().to_vec()
    }

    /// Signs the file at `bin_path` and writes `<dir>/export.sig`
    ///
    /// Returns the absolute path of the signature file.
    pub fn write_signature_file(
        &self,
        bin_path: &Path,
        dir: &Path,
        batch_num: i32,
        batch_size: i32,
    ) -> Result<PathBuf> {
        let bytes = fs::read(bin_path)?;
        let list = TekSignatureList {
            signatures: vec![TekSignature {
                signature_info: Some(self.signature_info.clone()),
                batch_num: Some(batch_num),
                batch_size: Some(batch_size),
                signature: Some(self.sign(&bytes)),
            }],
        };
        write_artifact(dir, EXPORT_SIG_FILE_NAME, &encode_signature_list(&list))
    }
}

/// Checks a DER signature over `bytes`
pub fn verify(public_key: &VerifyingKey, bytes: &[u8], signature: &[u8]) -> Result<()> {
    let signature = DerSignature::from_bytes(signature)
        .map_err(|e| TekError::Signing(format!("Malformed DER signature: {e}")))?;
    public_key
        .verify(bytes, &signature)
        .map_err(|e| TekError::Signing(format!("Signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::format::decode_signature_list;
    use p256::pkcs8::{EncodePrivateKey, LineEnding};
    use rand::rngs::OsRng;
    use tempfile::TempDir;

    fn info() -> SignatureInfo {
        SignatureInfo::ecdsa_p256("440", "v1")
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = ExportSigner::new(SigningKey::random(&mut OsRng), info());
        let signature = signer.sign(b"EK Export v1    payload");

        assert!(verify(&signer.verifying_key(), b"EK Export v1    payload", &signature).is_ok());
        assert!(verify(&signer.verifying_key(), b"EK Export v1    tampered", &signature).is_err());
        // DER SEQUENCE tag
        assert_eq!(signature[0], 0x30);
    }

    #[test]
    fn test_loads_pkcs8_and_sec1_pem() {
        let key = SigningKey::random(&mut OsRng);
        let pkcs8 = key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let signer = ExportSigner::from_pem(&pkcs8, info()).unwrap();
        assert_eq!(&signer.verifying_key(), key.verifying_key());

        let secret = SecretKey::random(&mut OsRng);
        let sec1 = secret.to_sec1_pem(LineEnding::LF).unwrap();
        let signer = ExportSigner::from_pem(&sec1, info()).unwrap();
        assert_eq!(&signer.verifying_key(), SigningKey::from(secret).verifying_key());
    }

    #[test]
    fn test_bad_key_material() {
        assert!(matches!(
            ExportSigner::from_pem("-----BEGIN NOTHING-----", info()),
            Err(TekError::Signing(_))
        ));
        assert!(matches!(
            ExportSigner::from_pem_file("/nonexistent/key.pem", info()),
            Err(TekError::Signing(_))
        ));
    }

    #[test]
    fn test_signature_file_contents() {
        let temp = TempDir::new().unwrap();
        let bin_path = temp.path().join("export.bin");
        fs::write(&bin_path, b"EK Export v1    body").unwrap();

        let signer = ExportSigner::new(SigningKey::random(&mut OsRng), info());
        let sig_path = signer
            .write_signature_file(&bin_path, temp.path(), 1, 1)
            .unwrap();

        let list = decode_signature_list(&fs::read(sig_path).unwrap()).unwrap();
        assert_eq!(list.signatures.len(), 1);
        let entry = &list.signatures[0];
        assert_eq!(entry.signature_info, Some(info()));
        assert_eq!(entry.batch_num, Some(1));
        assert_eq!(entry.batch_size, Some(1));

        let signature = entry.signature.as_deref().unwrap();
        assert!(verify(&signer.verifying_key(), b"EK Export v1    body", signature).is_ok());
    }
}
