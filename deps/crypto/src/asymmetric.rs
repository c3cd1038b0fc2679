// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

pub mod rsa {
    pub use crate::rust::rsa::*;

    /// Modulus size of key pairs generated by [`RSAKeyPair::new`].
    pub const RSA_PUBKEY_LENGTH: usize = 2048;

    /// Algorithm tag of an RSA-OAEP encrypted key, as carried in rewrap payloads.
    pub const RSA_OAEP_ALGORITHM: &str = "RSA-PKCS1-OAEP";

    /// Hash used by the OAEP padding.
    pub const RSA_OAEP_HASH_ALGORITHM: &str = "sha256";
}
