//! MD5 + SHA-256 verification of downloaded payloads.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::api::Checksums;
use crate::error::{MirrorError, MirrorResult};

/// Lowercase hexadecimal MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Lowercase hexadecimal SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compute both digests of `data`.
pub fn checksums_of(data: &[u8]) -> Checksums {
    Checksums {
        md5: md5_hex(data),
        sha256: sha256_hex(data),
    }
}

/// Verify that `data` matches both declared digests.
///
/// Comparison is case-insensitive on the declared value.
pub fn verify(url: &str, data: &[u8], expected: &Checksums) -> MirrorResult<()> {
    let md5 = md5_hex(data);
    if !md5.eq_ignore_ascii_case(&expected.md5) {
        return Err(MirrorError::ChecksumMismatch {
            url: url.to_string(),
            algorithm: "MD5",
            expected: expected.md5.clone(),
            actual: md5,
        });
    }

    let sha256 = sha256_hex(data);
    if !sha256.eq_ignore_ascii_case(&expected.sha256) {
        return Err(MirrorError::ChecksumMismatch {
            url: url.to_string(),
            algorithm: "SHA256",
            expected: expected.sha256.clone(),
            actual: sha256,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_known_digests() {
        assert_eq!(md5_hex(b"hello world"), HELLO_MD5);
        assert_eq!(sha256_hex(b"hello world"), HELLO_SHA256);
    }

    #[test]
    fn test_empty_digests() {
        let sums = checksums_of(b"");
        assert_eq!(sums.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            sums.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_match() {
        let expected = Checksums {
            md5: HELLO_MD5.to_uppercase(),
            sha256: HELLO_SHA256.to_string(),
        };
        assert!(verify("u", b"hello world", &expected).is_ok());
    }

    #[test]
    fn test_verify_md5_mismatch() {
        let expected = Checksums {
            md5: "0".repeat(32),
            sha256: HELLO_SHA256.to_string(),
        };
        let err = verify("u", b"hello world", &expected).unwrap_err();
        assert!(matches!(err, MirrorError::ChecksumMismatch { algorithm: "MD5", .. }));
    }

    #[test]
    fn test_verify_sha256_mismatch() {
        let expected = Checksums {
            md5: HELLO_MD5.to_string(),
            sha256: "0".repeat(64),
        };
        match verify("u", b"hello world", &expected) {
            Err(MirrorError::ChecksumMismatch {
                algorithm, actual, ..
            }) => {
                assert_eq!(algorithm, "SHA256");
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
    }
}
