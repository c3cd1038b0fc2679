// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Lifecycle of secrets held by an encryption backend: encrypt, rewrap for
//! a recipient's RSA key, and delete, for single secrets and batches.
//!
//! Clear text only ever exists inside one of these operations. Whatever the
//! outcome, the `clearText` field of every secret handed in is empty once
//! the operation returns.

pub mod error;
pub mod secret;

pub use backends::{BackendConfig, Backends};
pub use error::*;
pub use secret::{envelope::EncryptedData, BulkSecret, Secret};
