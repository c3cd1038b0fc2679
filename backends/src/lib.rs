// Copyright (c) 2024 The Secrets API Authors
//
// SPDX-License-Identifier: Apache-2.0
//

pub mod api;
pub use api::*;

pub mod config;
pub use config::BackendConfig;

pub mod error;
pub use error::*;

pub mod plugins;
pub use plugins::{Backend, BackendKind, Backends};

pub mod utils;
