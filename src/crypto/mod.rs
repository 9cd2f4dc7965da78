//! Cryptographic primitives for sealed blocks
//!
//! Block payload encryption with a process-wide key. Key derivation uses a
//! passphrase and salt from configuration; production deployments must supply
//! their own key material through `EntryCipher::from_key`.

pub mod cipher;

pub use cipher::{EncryptedPayload, EntryCipher};
