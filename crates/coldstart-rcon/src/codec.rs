//! Source RCON packet framing.
//!
//! Wire format (little-endian): `size: i32` (byte length of the rest),
//! `id: i32`, `type: i32`, a NUL-terminated body, and one trailing NUL.
//! <https://developer.valvesoftware.com/wiki/Source_RCON_Protocol>

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SERVERDATA_AUTH
pub const TYPE_AUTH: i32 = 3;
/// SERVERDATA_AUTH_RESPONSE (same value as EXECCOMMAND on the wire)
pub const TYPE_AUTH_RESPONSE: i32 = 2;
/// SERVERDATA_EXECCOMMAND
pub const TYPE_EXEC_COMMAND: i32 = 2;
/// SERVERDATA_RESPONSE_VALUE
pub const TYPE_RESPONSE_VALUE: i32 = 0;

/// Servers must accept bodies up to 4096 bytes; anything larger in a
/// response is a framing error.
const MAX_BODY: usize = 4096;

/// One decoded RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub packet_type: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, packet_type: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            packet_type,
            body: body.into(),
        }
    }
}

/// Encode a packet into its wire representation.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let body = packet.body.as_bytes();
    // id + type + body + two NULs
    let size = (4 + 4 + body.len() + 2) as i32;
    let mut buf = Vec::with_capacity(4 + size as usize);
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(&packet.id.to_le_bytes());
    buf.extend_from_slice(&packet.packet_type.to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(&[0, 0]);
    buf
}

/// Write one packet to the stream.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> std::io::Result<()> {
    writer.write_all(&encode(packet)).await?;
    writer.flush().await
}

/// Read one packet from the stream.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Packet> {
    let mut size_buf = [0u8; 4];
    reader.read_exact(&mut size_buf).await?;
    let size = i32::from_le_bytes(size_buf);

    if !(10..=(MAX_BODY as i32 + 10)).contains(&size) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("rcon packet size {size} out of range"),
        ));
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await?;

    let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let packet_type = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

    // Strip the body's NUL terminator and the trailing pad byte.
    let body_bytes = &payload[8..payload.len().saturating_sub(2)];
    let body = String::from_utf8_lossy(body_bytes).into_owned();

    Ok(Packet {
        id,
        packet_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_preserves_fields() {
        let packet = Packet::new(42, TYPE_EXEC_COMMAND, "status");
        let wire = encode(&packet);

        let mut reader = std::io::Cursor::new(wire);
        let decoded = read_packet(&mut reader).await.unwrap();
        assert_eq!(decoded, packet);
    }

    #[tokio::test]
    async fn empty_body_roundtrips() {
        let packet = Packet::new(-1, TYPE_AUTH_RESPONSE, "");
        let wire = encode(&packet);
        assert_eq!(wire.len(), 4 + 10);

        let mut reader = std::io::Cursor::new(wire);
        let decoded = read_packet(&mut reader).await.unwrap();
        assert_eq!(decoded.id, -1);
        assert_eq!(decoded.body, "");
    }

    #[tokio::test]
    async fn oversized_length_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(1_000_000i32).to_le_bytes());
        wire.extend_from_slice(&[0u8; 16]);

        let mut reader = std::io::Cursor::new(wire);
        let err = read_packet(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn encoded_size_field_matches_payload() {
        let wire = encode(&Packet::new(7, TYPE_AUTH, "secret"));
        let size = i32::from_le_bytes([wire[0], wire[1], wire[2], wire[3]]);
        assert_eq!(size as usize, wire.len() - 4);
    }
}
