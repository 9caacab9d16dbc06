use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

use crate::config::SslMode;
use crate::error::PgScopeError;

/// Build the TLS connector for `mode`; `None` means plain TCP.
///
/// # Errors
/// Returns `PgScopeError::ConnectionError` if the platform TLS backend cannot be initialised.
pub(crate) fn make_connector(mode: SslMode) -> Result<Option<MakeTlsConnector>, PgScopeError> {
    let mut builder = TlsConnector::builder();
    match mode {
        SslMode::Disable => return Ok(None),
        SslMode::Prefer | SslMode::Require => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyFull => {}
    }
    let connector = builder
        .build()
        .map_err(|e| PgScopeError::ConnectionError(format!("tls setup error: {e}")))?;
    Ok(Some(MakeTlsConnector::new(connector)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_uses_plain_tcp() {
        assert!(make_connector(SslMode::Disable).unwrap().is_none());
    }

    #[test]
    fn encrypted_modes_build_a_connector() {
        for mode in [
            SslMode::Prefer,
            SslMode::Require,
            SslMode::VerifyCa,
            SslMode::VerifyFull,
        ] {
            let connector = make_connector(mode).unwrap();
            assert!(connector.is_some(), "{mode:?} should negotiate TLS");
        }
    }
}
