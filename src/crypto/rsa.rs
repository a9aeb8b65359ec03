// dkim-domain-proof – domain ownership proofs from DKIM-signed email
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

use crate::crypto::VerificationError;
use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Sign,
    RsaPublicKey,
};
use sha2::Sha256;

pub fn get_public_key_size(k: &RsaPublicKey) -> usize {
    k.size() * 8
}

pub fn read_rsa_public_key(
    key_data: &[u8],
    min_key_bits: usize,
) -> Result<RsaPublicKey, VerificationError> {
    // SubjectPublicKeyInfo first, then RSAPublicKey
    let public_key = RsaPublicKey::from_public_key_der(key_data)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(key_data))
        .map_err(|_| VerificationError::InvalidKey)?;

    if get_public_key_size(&public_key) < min_key_bits {
        return Err(VerificationError::InsufficientKeySize);
    }

    Ok(public_key)
}

/// Verifies an RSA signature over a SHA-256 hash.
pub fn verify_rsa(
    public_key: &RsaPublicKey,
    hash: &[u8],
    signature_data: &[u8],
) -> Result<(), VerificationError> {
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), hash, signature_data)
        .map_err(|_| VerificationError::VerificationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};
    use sha2::{Digest, Sha256};

    fn der_of(pem: &str) -> Vec<u8> {
        let b64: String = pem.lines().filter(|l| !l.starts_with("-----")).collect();
        crate::util::decode_base64(&b64).unwrap()
    }

    #[test]
    fn read_rsa_public_key_ok() {
        let key_data = der_of(include_str!("../../tests/keys/rsa2048pub.pem"));

        let public_key = read_rsa_public_key(&key_data, 1024).unwrap();
        assert_eq!(get_public_key_size(&public_key), 2048);

        assert_eq!(
            read_rsa_public_key(&key_data, 4096),
            Err(VerificationError::InsufficientKeySize)
        );
        assert_eq!(
            read_rsa_public_key(b"not a key", 1024),
            Err(VerificationError::InvalidKey)
        );
    }

    #[test]
    fn read_rsa_public_key_too_small() {
        let key_data = der_of(include_str!("../../tests/keys/rsa512pub.pem"));

        assert!(read_rsa_public_key(&key_data, 1024).is_err());
    }

    #[test]
    fn verify_rsa_ok() {
        let private_key =
            RsaPrivateKey::from_pkcs8_pem(include_str!("../../tests/keys/rsa2048.pem")).unwrap();
        let public_key = private_key.to_public_key();

        let msg = b"subject:Verify 7f3a9c21\r\ndkim-signature:b=";
        let hash = Sha256::digest(msg);
        let signature = private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hash)
            .unwrap();

        assert_eq!(verify_rsa(&public_key, &hash, &signature), Ok(()));

        let mut tampered = msg.to_vec();
        tampered[0] ^= 1;
        assert_eq!(
            verify_rsa(&public_key, &Sha256::digest(tampered), &signature),
            Err(VerificationError::VerificationFailure)
        );
    }
}
