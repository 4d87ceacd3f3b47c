//! Client key loading.

use std::fs;
use std::path::Path;

use russh_keys::{HashAlg, PrivateKey};

use crate::error::TunnelError;
use crate::logging::TunnelLogger;

/// Load the private key used to authenticate to the proxy.
///
/// When a passphrase is given the key is first parsed with it, but the key
/// that is returned always comes from a second parse without the passphrase.
/// Encrypted keys therefore fail with [`TunnelError::KeyParse`].
pub fn load_client_key(
    path: &Path,
    passphrase: Option<&str>,
    logger: &TunnelLogger,
) -> Result<PrivateKey, TunnelError> {
    logger.info(format_args!("Loading client key from {}...", path.display()));
    let key_data = fs::read_to_string(path).map_err(|source| TunnelError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(passphrase) = passphrase {
        if let Err(e) = russh_keys::decode_secret_key(&key_data, Some(passphrase)) {
            logger.warn(format_args!(
                "Passphrase parse of {} failed: {}",
                path.display(),
                e
            ));
        }
        logger.warn(format_args!(
            "Passphrase for {} is not used, falling back to an unencrypted parse",
            path.display()
        ));
    }

    let key = russh_keys::decode_secret_key(&key_data, None)?;
    logger.info(format_args!(
        "Client key fingerprint: {}",
        key.public_key().fingerprint(HashAlg::Sha256)
    ));
    Ok(key)
}
