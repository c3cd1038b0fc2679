// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Whether `text` decodes as standard (padded) base64.
pub fn is_base64(text: &str) -> bool {
    STANDARD.decode(text).is_ok()
}

/// Return `text` unchanged if it already decodes as base64, otherwise its
/// base64 encoding.
pub fn normalize_base64(text: &str) -> Zeroizing<String> {
    if is_base64(text) {
        Zeroizing::new(text.to_owned())
    } else {
        Zeroizing::new(STANDARD.encode(text))
    }
}

/// Key names end up in file and Vault paths, so they must be a single
/// non-empty path segment.
pub(crate) fn validate_key_name(key_name: &str) -> Result<()> {
    if key_name.is_empty()
        || key_name == "."
        || key_name == ".."
        || key_name.contains(['/', '\\', '\0'])
    {
        return Err(Error::KeyResolution(format!(
            "illegal key name `{key_name}`"
        )));
    }

    Ok(())
}
