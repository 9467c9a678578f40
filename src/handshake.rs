//! The handshake + authentication state machine (spec §4.4):
//! `AWAIT_HANDSHAKE -> (optional) SSL_UPGRADING -> SEND_HANDSHAKE_RESPONSE ->
//! AUTH_NEGOTIATION -> SESSION_INIT -> READY`, terminal `FAILED`.
//!
//! Grounded on `sqlx_core::mysql::connection::tls::maybe_upgrade` for the
//! SSL-upgrade decision and `connection/mod.rs::Connect::connect_with` for
//! the session-init SQL; the auth-negotiation loop itself has no single
//! surviving teacher file (it was split across a missing `connection/auth.rs`
//! in the retrieval snapshot) and is built from spec §4.4's transition list.

use crate::auth::{self, NextAction};
use crate::capabilities::Capabilities;
use crate::collation::COLLATION_UTF8MB4_UNICODE_CI;
use crate::context::{ConnectionContext, ServerVersion};
use crate::error::{Error, Result};
use crate::message::client;
use crate::message::server::{self, DecodeContext, HandshakeV10, ServerMessage};
use crate::net::tls;
use crate::options::MySqlConnectOptions;
use crate::status::ServerStatus;
use crate::transport::PacketTransport;

pub(crate) const MAX_PACKET_SIZE: u32 = 0xFF_FFFF;

pub(crate) struct HandshakeOutcome {
    pub(crate) context: ConnectionContext,
}

/// Runs the full handshake against a freshly-connected socket, leaving the
/// transport in `READY` (authenticated, any TLS upgrade and compression
/// already applied) or returning an error that the caller must treat as
/// fatal (spec §4.4 terminal `FAILED` state force-closes the connection).
pub(crate) async fn run(
    transport: &mut PacketTransport,
    host: &str,
    options: &MySqlConnectOptions,
) -> Result<HandshakeOutcome> {
    let packet = transport.read_packet().await?;
    let handshake = match server::decode(&packet, DecodeContext::Login, Capabilities::empty())? {
        ServerMessage::HandshakeV10(h) => h,
        ServerMessage::Err(err) => return Err(database_error(err)),
        _ => return Err(crate::error::protocol_err!("expected initial handshake packet")),
    };

    let client_capabilities = desired_client_capabilities(options);
    let mut capabilities = client_capabilities & handshake.capabilities;
    capabilities |= Capabilities::PROTOCOL_41; // mandatory for this crate (spec §1 non-goals)

    let collation = COLLATION_UTF8MB4_UNICODE_CI as u8;

    let upgraded = maybe_upgrade_tls(transport, host, options, &mut capabilities, &handshake).await?;
    if upgraded {
        transport.reset_sequence();
    }

    let mut plugin_name = handshake
        .auth_plugin_name
        .clone()
        .unwrap_or_else(|| "mysql_native_password".to_string());
    let mut nonce = handshake.auth_plugin_data.clone();

    let plugin = auth::by_name(&plugin_name);
    let auth_response = plugin.authenticate(options.password.as_deref().unwrap_or(""), &nonce)?;

    if plugin.is_ssl_required() && !transport.is_tls() {
        return Err(Error::Tls(
            format!("auth plugin {plugin_name} requires a secure transport").into(),
        ));
    }

    let attrs = connection_attributes(options);

    let response = client::HandshakeResponse {
        max_packet_size: MAX_PACKET_SIZE,
        client_collation: collation,
        username: &options.username,
        database: options.database.as_deref(),
        auth_plugin_name: &plugin_name,
        auth_response: &auth_response,
        connection_attrs: &attrs,
        zstd_level: options.zstd_compression_level,
    };

    let mut buf = bytes::BytesMut::new();
    response.encode(&mut buf, capabilities);
    transport.send_packet(&buf).await?;

    let ok = loop {
        let packet = transport.read_packet().await?;
        match server::decode(&packet, DecodeContext::Login, capabilities)? {
            ServerMessage::Ok(ok) => break ok,

            ServerMessage::Err(err) => return Err(database_error(err)),

            ServerMessage::AuthSwitchRequest(switch) => {
                plugin_name = switch.plugin_name;
                nonce = switch.plugin_data;
                let plugin = auth::by_name(&plugin_name);
                let response = plugin
                    .authenticate(options.password.as_deref().unwrap_or(""), &nonce)?;
                transport.send_packet(&response).await?;
            }

            ServerMessage::AuthMoreData(data) => {
                let next = interpret_auth_more_data(&plugin_name, &data);
                match next {
                    NextAction::Done => continue,
                    NextAction::SendFullAuth => {
                        let response = full_auth_response(
                            transport,
                            capabilities,
                            options.password.as_deref().unwrap_or(""),
                            &nonce,
                        )
                        .await?;
                        transport.send_packet(&response).await?;
                    }
                }
            }

            _ => return Err(crate::error::protocol_err!("unexpected message during auth negotiation")),
        }
    };

    transport.reset_sequence();

    let server_version = ServerVersion::parse(&handshake.server_version);

    let context = ConnectionContext {
        connection_id: handshake.connection_id,
        server_version,
        capabilities,
        status: ok.status,
        client_collation: COLLATION_UTF8MB4_UNICODE_CI,
        server_collation: handshake.default_collation as u16,
        connection_time_zone: options.connection_time_zone,
        zero_date: options.zero_date,
        local_infile_root: options.local_infile_root.clone(),
        local_infile_buffer_size: options.local_infile_buffer_size,
        preserve_instants: options.preserve_instants,
        tiny_int1_is_bit: options.tiny_int1_is_bit,
        auth_plugin_name: plugin_name,
        auth_nonce: nonce,
    };

    Ok(HandshakeOutcome { context })
}

fn desired_client_capabilities(options: &MySqlConnectOptions) -> Capabilities {
    let mut caps = Capabilities::client_default();
    if options.database.is_some() {
        caps |= Capabilities::CONNECT_WITH_DB;
    }
    if !matches!(
        options.ssl_mode,
        crate::options::MySqlSslMode::Disabled | crate::options::MySqlSslMode::Tunnel
    ) {
        caps |= Capabilities::SSL;
    }
    if options.compression_algorithms.contains(&crate::options::CompressionAlgorithmOption::Zlib) {
        caps |= Capabilities::COMPRESS;
    }
    if options
        .compression_algorithms
        .contains(&crate::options::CompressionAlgorithmOption::Zstd)
    {
        caps |= Capabilities::ZSTD_COMPRESSION_ALGORITHM;
    }
    caps
}

async fn maybe_upgrade_tls(
    transport: &mut PacketTransport,
    host: &str,
    options: &MySqlConnectOptions,
    capabilities: &mut Capabilities,
    handshake: &HandshakeV10,
) -> Result<bool> {
    if !handshake.capabilities.contains(Capabilities::SSL) {
        if matches!(
            options.ssl_mode,
            crate::options::MySqlSslMode::Required
                | crate::options::MySqlSslMode::VerifyCa
                | crate::options::MySqlSslMode::VerifyIdentity
        ) {
            return Err(Error::Tls("server does not support TLS".into()));
        }
        return Ok(false);
    }

    if matches!(options.ssl_mode, crate::options::MySqlSslMode::Disabled) {
        return Ok(false);
    }

    let ssl_request = client::SslRequest {
        max_packet_size: MAX_PACKET_SIZE,
        client_collation: COLLATION_UTF8MB4_UNICODE_CI as u8,
    };
    let mut buf = bytes::BytesMut::new();
    ssl_request.encode(&mut buf, *capabilities | Capabilities::SSL);
    transport.send_packet(&buf).await?;

    let upgraded = transport
        .upgrade_socket(|socket| tls::maybe_upgrade(socket, host, options))
        .await?;

    if upgraded {
        *capabilities |= Capabilities::SSL;
    }

    Ok(upgraded)
}

/// Interprets the single `AUTH_MORE_DATA` status byte `caching_sha2_password`
/// sends (spec §4.4 "the single byte carries fast-success... or needs-full-auth").
pub(crate) fn interpret_auth_more_data(plugin_name: &str, data: &[u8]) -> NextAction {
    if plugin_name == "caching_sha2_password" && data.len() == 1 {
        if data[0] == auth::CACHING_SHA2_FULL_AUTH_REQUIRED {
            return NextAction::SendFullAuth;
        }
        if data[0] == auth::CACHING_SHA2_FAST_AUTH_SUCCESS {
            return NextAction::Done;
        }
    }
    NextAction::Done
}

/// Produces the response to send after a `caching_sha2_password`/
/// `sha256_password` "full authentication required" signal (spec §4.4): the
/// bare password over an already-secure channel, or an RSA-OAEP-encrypted
/// round-trip against the server's public key otherwise.
pub(crate) async fn full_auth_response(
    transport: &mut PacketTransport,
    capabilities: Capabilities,
    password: &str,
    nonce: &[u8],
) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Ok(vec![0]);
    }

    if transport.is_tls() {
        let mut bytes = password.as_bytes().to_vec();
        bytes.push(0);
        return Ok(bytes);
    }

    transport
        .send_packet(&[auth::rsa_key_exchange::PUBLIC_KEY_REQUEST])
        .await?;
    let packet = transport.read_packet().await?;
    let public_key_pem = match server::decode(&packet, DecodeContext::Login, capabilities)? {
        ServerMessage::AuthMoreData(data) => String::from_utf8(data.into_vec())
            .map_err(|_| crate::error::protocol_err!("server's RSA public key was not valid UTF-8"))?,
        ServerMessage::Err(err) => return Err(database_error(err)),
        other => return Err(crate::error::protocol_err!(
            "expected the server's RSA public key after requesting it; got {other:?}"
        )),
    };

    auth::rsa_key_exchange::encrypt_password(password, nonce, &public_key_pem)
}

fn database_error(err: crate::message::server::ErrPacket) -> Error {
    Error::Database(crate::error::MySqlDatabaseError::new(
        err.error_code,
        err.sql_state,
        err.error_message,
    ))
}

fn connection_attributes(options: &MySqlConnectOptions) -> Vec<(String, String)> {
    // spec §10 "connection attributes `_client_name`/`_client_version`/`_os`/`_pid`".
    let mut attrs = vec![
        ("_client_name".to_string(), "myproto".to_string()),
        ("_client_version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ("_os".to_string(), std::env::consts::OS.to_string()),
        ("_pid".to_string(), std::process::id().to_string()),
    ];
    attrs.extend(options.session_variables.iter().map(|(k, v)| (k.clone(), v.clone())));
    attrs
}
