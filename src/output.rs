//! Delivery adapters: memory buffers, files and writers
//!
//! Every adapter generates and encodes the whole pair before it touches any
//! output, so a failed generation never leaves a half-written pair behind.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{CertgenError, Result};
use crate::factory::{PemPair, encode_pem, generate};
use crate::params::CertParams;

/// Generate a pair and return both PEM blocks in memory.
pub fn generate_to_memory(params: &CertParams) -> Result<PemPair> {
    let generated = generate(params)?;
    encode_pem(&generated)
}

/// Generate a pair and write it to `cert_path` and `key_path`.
///
/// Both files are created or truncated. On Unix the key file is readable
/// and writable by its owner only.
pub fn generate_to_file(
    params: &CertParams,
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<()> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();
    let pair = generate_to_memory(params)?;

    let mut cert_out = File::create(cert_path).map_err(|e| CertgenError::io_at(cert_path, e))?;
    write_block(&mut cert_out, &pair.cert, || cert_path.display().to_string())?;
    log::info!("written {}", cert_path.display());

    let mut key_out = create_private(key_path)?;
    write_block(&mut key_out, &pair.key, || key_path.display().to_string())?;
    log::info!("written {}", key_path.display());

    Ok(())
}

/// Generate a pair and write the certificate to `cert_out`, the key to `key_out`.
pub fn generate_to_writer<C, K>(params: &CertParams, cert_out: &mut C, key_out: &mut K) -> Result<()>
where
    C: Write + ?Sized,
    K: Write + ?Sized,
{
    let pair = generate_to_memory(params)?;
    write_block(cert_out, &pair.cert, || "certificate writer".to_string())?;
    write_block(key_out, &pair.key, || "key writer".to_string())?;
    Ok(())
}

fn write_block<W, F>(out: &mut W, block: &str, target: F) -> Result<()>
where
    W: Write + ?Sized,
    F: Fn() -> String,
{
    out.write_all(block.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| CertgenError::io_on(&target(), e))
}

/// Create or truncate `path` for a private key, owner-only on Unix.
fn create_private(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let file = options.open(path).map_err(|e| CertgenError::io_at(path, e))?;

    // `mode` only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = std::fs::metadata(path)
            .map_err(|e| CertgenError::io_at(path, e))?
            .permissions();
        if perms.mode() & 0o777 != 0o600 {
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms).map_err(|e| CertgenError::io_at(path, e))?;
        }
    }

    Ok(file)
}
