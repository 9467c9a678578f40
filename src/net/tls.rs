//! TLS upgrade negotiation (spec §4.4 "SSL_UPGRADING", §6).
//!
//! Grounded on `sqlx_core::mysql::connection::tls::{maybe_upgrade, upgrade}`,
//! re-pointed at `tokio-rustls` (this crate's default TLS backend) with a
//! `native-tls` fallback path selected the same way the teacher picks
//! between runtimes.

#[cfg(feature = "rustls")]
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::net::socket::MaybeTlsStream;
#[cfg(any(feature = "rustls", feature = "native-tls"))]
use crate::net::socket::tls_err;
use crate::options::{MySqlConnectOptions, MySqlSslMode};

/// Runs the SSL-upgrade decision for `options.ssl_mode` against an
/// already-connected plaintext socket that has just received the server's
/// handshake. Returns the (possibly upgraded) stream and whether it upgraded.
pub(crate) async fn maybe_upgrade(
    stream: MaybeTlsStream,
    host: &str,
    options: &MySqlConnectOptions,
) -> Result<(MaybeTlsStream, bool)> {
    match options.ssl_mode {
        // An already-tunneled transport: the driver performs no TLS
        // negotiation of its own (spec §6 `TUNNEL`).
        MySqlSslMode::Disabled | MySqlSslMode::Tunnel => Ok((stream, false)),

        MySqlSslMode::Preferred => upgrade(stream, host, options).await,

        MySqlSslMode::Required | MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity => {
            let (stream, upgraded) = upgrade(stream, host, options).await?;
            if !upgraded {
                return Err(Error::Tls("server does not support TLS".into()));
            }
            Ok((stream, true))
        }
    }
}

async fn upgrade(
    stream: MaybeTlsStream,
    host: &str,
    options: &MySqlConnectOptions,
) -> Result<(MaybeTlsStream, bool)> {
    let tcp = match stream {
        MaybeTlsStream::Tcp(tcp) => tcp,
        // Already TLS, or a Unix socket (which never upgrades).
        other => return Ok((other, false)),
    };

    #[cfg(feature = "rustls")]
    {
        let connector = build_rustls_connector(options)?;
        let server_name = rustls::ServerName::try_from(host).map_err(tls_err)?;

        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| tls_err(e))?;

        return Ok((MaybeTlsStream::Rustls(Box::new(tls)), true));
    }

    #[cfg(all(not(feature = "rustls"), feature = "native-tls"))]
    {
        let mut builder = native_tls::TlsConnector::builder();
        let accept_invalid_certs = !matches!(
            options.ssl_mode,
            MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity
        );
        builder
            .danger_accept_invalid_certs(accept_invalid_certs)
            .danger_accept_invalid_hostnames(!matches!(
                options.ssl_mode,
                MySqlSslMode::VerifyIdentity
            ));

        let connector: tokio_native_tls::TlsConnector = builder.build().map_err(tls_err)?.into();
        let tls = connector.connect(host, tcp).await.map_err(tls_err)?;
        return Ok((MaybeTlsStream::NativeTls(Box::new(tls)), true));
    }

    #[cfg(not(any(feature = "rustls", feature = "native-tls")))]
    {
        let _ = (host, options, tcp);
        Err(Error::Tls("no TLS backend compiled in".into()))
    }
}

#[cfg(feature = "rustls")]
fn build_rustls_connector(options: &MySqlConnectOptions) -> Result<tokio_rustls::TlsConnector> {
    use rustls::{Certificate, ClientConfig, RootCertStore};

    let mut roots = RootCertStore::empty();

    if let Some(ca_path) = &options.ssl_ca {
        let data = std::fs::read(ca_path)?;
        let mut reader = std::io::BufReader::new(&data[..]);
        for cert in rustls_pemfile::certs(&mut reader).map_err(|e| Error::Tls(Box::new(e)))? {
            roots
                .add(&Certificate(cert))
                .map_err(|e| Error::Tls(Box::new(e)))?;
        }
    } else {
        roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));
    }

    let roots_for_verifier = roots.clone();

    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    match options.ssl_mode {
        // Full verification: chain and hostname (rustls' built-in default).
        MySqlSslMode::VerifyIdentity => {}
        // Chain verification only; the hostname is allowed to mismatch.
        MySqlSslMode::VerifyCa => config
            .dangerous()
            .set_certificate_verifier(Arc::new(ChainOnlyVerifier(
                rustls::client::WebPkiVerifier::new(roots_for_verifier, None),
            ))),
        // Neither chain nor hostname verified (spec §6 `PREFERRED`/`REQUIRED`).
        // `Disabled`/`Tunnel` never reach this function (spec §6 `TUNNEL`
        // and `DISABLED` both skip TLS negotiation entirely), but are
        // listed for match exhaustiveness.
        MySqlSslMode::Disabled
        | MySqlSslMode::Tunnel
        | MySqlSslMode::Preferred
        | MySqlSslMode::Required => config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoVerifier)),
    }

    Ok(tokio_rustls::TlsConnector::from(Arc::new(config)))
}

/// Accepts any server certificate. Used for `SslMode::Preferred`/`Required`,
/// which (per spec §6) verify neither the chain nor the hostname.
#[cfg(feature = "rustls")]
struct NoVerifier;

#[cfg(feature = "rustls")]
impl rustls::client::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// Delegates to the default chain verifier but tolerates a hostname
/// mismatch, for `SslMode::VerifyCa` (trust the CA, skip identity).
#[cfg(feature = "rustls")]
struct ChainOnlyVerifier(rustls::client::WebPkiVerifier);

#[cfg(feature = "rustls")]
impl rustls::client::ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::Certificate,
        intermediates: &[rustls::Certificate],
        server_name: &rustls::ServerName,
        scts: &mut dyn Iterator<Item = &[u8]>,
        ocsp_response: &[u8],
        now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        match self.0.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            scts,
            ocsp_response,
            now,
        ) {
            Ok(verified) => Ok(verified),
            Err(rustls::Error::InvalidCertificate(rustls::CertificateError::NotValidForName)) => {
                Ok(rustls::client::ServerCertVerified::assertion())
            }
            Err(e) => Err(e),
        }
    }
}
