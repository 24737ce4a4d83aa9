//! The probe itself: connect, authenticate, `status`, parse.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::codec::{
    self, Packet, TYPE_AUTH, TYPE_AUTH_RESPONSE, TYPE_EXEC_COMMAND, TYPE_RESPONSE_VALUE,
};
use crate::error::{ProbeError, ProbeResult};
use crate::parse;

/// Last known game server identity and occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub online: u32,
    pub max: u32,
}

/// A Source RCON client configured once with port and password.
///
/// Each [`RconProbe::status`] call opens a fresh connection, performs a
/// single exchange, and drops it. Connection attempts are bounded by
/// `connect_timeout`; reads by `read_timeout`.
pub struct RconProbe {
    port: u16,
    password: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl RconProbe {
    pub fn new(port: u16, password: impl Into<String>) -> Self {
        Self {
            port,
            password: password.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }

    /// Probe the server at `ip` once.
    pub async fn status(&self, ip: &str) -> ProbeResult<ServerInfo> {
        let addr = format!("{}:{}", ip, self.port);

        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ProbeError::Unreachable(format!("connect to {addr} timed out")))?
            .map_err(|e| ProbeError::Unreachable(format!("connect to {addr}: {e}")))?;

        self.authenticate(&mut stream).await?;

        let request_id = 1;
        codec::write_packet(&mut stream, &Packet::new(request_id, TYPE_EXEC_COMMAND, "status"))
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let response = self.read_next(&mut stream).await?;
        if response.packet_type != TYPE_RESPONSE_VALUE || response.id != request_id {
            return Err(ProbeError::ProtocolMismatch(format!(
                "expected response {request_id}, got id {} type {}",
                response.id, response.packet_type
            )));
        }

        let (online, max) = parse::player_count(&response.body)?;
        let name = parse::server_name(&response.body)?;

        debug!(%addr, %name, online, max, "probe succeeded");
        Ok(ServerInfo { name, online, max })
    }

    async fn authenticate(&self, stream: &mut TcpStream) -> ProbeResult<()> {
        let auth_id = 0;
        codec::write_packet(stream, &Packet::new(auth_id, TYPE_AUTH, self.password.as_str()))
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        // Some servers send an empty RESPONSE_VALUE before the auth
        // response; skip those.
        loop {
            let packet = self.read_next(stream).await?;
            match packet.packet_type {
                TYPE_RESPONSE_VALUE => continue,
                TYPE_AUTH_RESPONSE => {
                    if packet.id == -1 {
                        return Err(ProbeError::ProtocolMismatch(
                            "authentication rejected".to_string(),
                        ));
                    }
                    if packet.id != auth_id {
                        return Err(ProbeError::ProtocolMismatch(format!(
                            "auth response id {} does not match request {auth_id}",
                            packet.id
                        )));
                    }
                    return Ok(());
                }
                other => {
                    return Err(ProbeError::ProtocolMismatch(format!(
                        "unexpected packet type {other} during auth"
                    )));
                }
            }
        }
    }

    async fn read_next(&self, stream: &mut TcpStream) -> ProbeResult<Packet> {
        tokio::time::timeout(self.read_timeout, codec::read_packet(stream))
            .await
            .map_err(|_| ProbeError::Unreachable("read timed out".to_string()))?
            .map_err(|e| ProbeError::Unreachable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const STATUS_BODY: &str = "\
hostname: Test Server
players : 2 (16 max)
";

    /// Minimal server side of the RCON exchange: one auth, one command.
    async fn fake_server(listener: TcpListener, accept_password: &str, status_body: &str) {
        let (mut stream, _) = listener.accept().await.unwrap();

        let auth = codec::read_packet(&mut stream).await.unwrap();
        assert_eq!(auth.packet_type, TYPE_AUTH);

        let auth_ok = auth.body == accept_password;
        let reply_id = if auth_ok { auth.id } else { -1 };
        codec::write_packet(&mut stream, &Packet::new(reply_id, TYPE_AUTH_RESPONSE, ""))
            .await
            .unwrap();
        if !auth_ok {
            return;
        }

        let command = codec::read_packet(&mut stream).await.unwrap();
        assert_eq!(command.body, "status");
        codec::write_packet(
            &mut stream,
            &Packet::new(command.id, TYPE_RESPONSE_VALUE, status_body),
        )
        .await
        .unwrap();

        let _ = stream.shutdown().await;
    }

    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn probes_a_live_server() {
        let (listener, port) = listen().await;
        let server = tokio::spawn(async move {
            fake_server(listener, "secret", STATUS_BODY).await;
        });

        let probe = RconProbe::new(port, "secret");
        let info = probe.status("127.0.0.1").await.unwrap();
        assert_eq!(info.name, "Test Server");
        assert_eq!(info.online, 2);
        assert_eq!(info.max, 16);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_password_is_protocol_mismatch() {
        let (listener, port) = listen().await;
        let server = tokio::spawn(async move {
            fake_server(listener, "secret", STATUS_BODY).await;
        });

        let probe = RconProbe::new(port, "wrong");
        let err = probe.status("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ProbeError::ProtocolMismatch(_)), "{err}");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn unparsable_status_is_parse_error() {
        let (listener, port) = listen().await;
        let server = tokio::spawn(async move {
            fake_server(listener, "secret", "something else entirely").await;
        });

        let probe = RconProbe::new(port, "secret");
        let err = probe.status("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)), "{err}");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        // Bind and drop to get a port that refuses connections.
        let (listener, port) = listen().await;
        drop(listener);

        let probe = RconProbe::new(port, "secret");
        let err = probe.status("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable(_)), "{err}");
    }
}
