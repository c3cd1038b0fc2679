// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Crypto
//!
//! This crate encapsulates the fixed set of crypto operations the secrets
//! service relies on, implemented in pure rust:
//! - AES-256-GCM sealing of clear text into a self-describing [`Envelope`]
//! - nonce-salted HMAC-SHA256 signatures
//! - RSA-OAEP-SHA256 wrapping of an ephemeral key for a rewrap recipient
//!
//! ## Components
//!
//! This crate include the following public submodules:
//! - `symmetric`: AES keys and the AES-GCM envelope
//! - `signing`: HMAC signatures with a fresh nonce per call
//! - `rsa`: RSA public key encryption (and a key pair, used by recipients)

mod rust;

pub mod rand;

mod symmetric;
pub use symmetric::*;

pub mod signing;

mod asymmetric;
pub use asymmetric::*;
