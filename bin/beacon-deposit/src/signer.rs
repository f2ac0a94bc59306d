//! Loading of the key deposits are sent from.

use std::{path::Path, str::FromStr};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};

use crate::errors::{DisplayableError, DisplayedError};

/// Where the signing key comes from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum KeySource<'a> {
    PrivateKey(&'a str),
    Keystore { path: &'a Path, passphrase: &'a str },
}

/// Loads the signer and checks it against `--from`, when given.
pub(crate) fn load_signer(
    source: KeySource<'_>,
    from: Option<Address>,
) -> Result<PrivateKeySigner, DisplayedError> {
    let signer = match source {
        KeySource::PrivateKey(key) => PrivateKeySigner::from_str(key.trim())
            .user_error("invalid private key. Supply 32 bytes of hex")?,
        KeySource::Keystore { path, passphrase } => {
            PrivateKeySigner::decrypt_keystore(path, passphrase).user_error(format!(
                "failed to decrypt keystore {}. Check the path and passphrase",
                path.display()
            ))?
        }
    };

    if let Some(from) = from {
        if from != signer.address() {
            return Err(DisplayedError::UserError(
                format!(
                    "--from {from} does not match the signing key's address {}",
                    signer.address()
                ),
                Box::new(from),
            ));
        }
    }

    Ok(signer)
}
