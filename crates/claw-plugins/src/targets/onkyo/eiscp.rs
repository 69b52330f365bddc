// eISCP framing: ISCP messages wrapped for TCP.
//
//   "ISCP" | header size (u32 BE, 16) | data size (u32 BE) | version (1) | 3 reserved
//   data: "!1" + command + terminator

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Error;

const MAGIC: &[u8; 4] = b"ISCP";
const HEADER_LEN: u32 = 16;
const VERSION: u8 = 0x01;
/// Unit type 1 = receiver.
const START: &[u8; 2] = b"!1";
/// Upper bound for a single message body; real responses are tiny.
const MAX_DATA_LEN: u32 = 64 * 1024;
/// Upper bound for the header, extension included.
const MAX_HEADER_LEN: u32 = HEADER_LEN + 64;

/// Wrap an ISCP command (`PWR01`, `MVLUP`, ...) in an eISCP frame.
pub fn encode(command: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(START.len() + command.len() + 1);
    data.extend_from_slice(START);
    data.extend_from_slice(command.as_bytes());
    data.push(b'\r');

    // Commands are a handful of ASCII bytes.
    let data_len = u32::try_from(data.len()).unwrap_or(u32::MAX);

    let mut frame = Vec::with_capacity(16 + data.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&HEADER_LEN.to_be_bytes());
    frame.extend_from_slice(&data_len.to_be_bytes());
    frame.extend_from_slice(&[VERSION, 0, 0, 0]);
    frame.extend_from_slice(&data);
    frame
}

/// Strip the `!1` prefix and any `EOF`/`CR`/`LF` terminator from a body.
pub fn decode(data: &[u8]) -> Result<String, Error> {
    let body = data
        .strip_prefix(START.as_slice())
        .ok_or_else(|| Error::Protocol(format!("message does not start with !1: {data:?}")))?;
    let end = body
        .iter()
        .rposition(|b| !matches!(b, 0x1A | b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    let body = body.get(..end).unwrap_or_default();
    String::from_utf8(body.to_vec()).map_err(|e| Error::Protocol(e.to_string()))
}

/// Read one framed message and return its decoded command.
pub async fn read_message<R>(reader: &mut R) -> Result<String, Error>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 16];
    reader.read_exact(&mut header).await?;

    let (magic, rest) = header.split_at(4);
    if magic != MAGIC {
        return Err(Error::Protocol(format!("bad magic {magic:?}")));
    }
    let word = |bytes: &[u8]| -> Result<u32, Error> {
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| Error::Protocol("short header".into()))?;
        Ok(u32::from_be_bytes(arr))
    };
    let header_len = word(&rest[..4])?;
    let data_len = word(&rest[4..8])?;
    if !(HEADER_LEN..=MAX_HEADER_LEN).contains(&header_len) {
        return Err(Error::Protocol(format!(
            "header size {header_len} outside {HEADER_LEN}..={MAX_HEADER_LEN}"
        )));
    }
    if data_len > MAX_DATA_LEN {
        return Err(Error::Protocol(format!("data size {data_len} too large")));
    }

    // Skip any header extension.
    let mut extra = vec![0u8; usize::try_from(header_len - HEADER_LEN).unwrap_or(0)];
    reader.read_exact(&mut extra).await?;

    let mut data = vec![0u8; usize::try_from(data_len).unwrap_or(0)];
    reader.read_exact(&mut data).await?;
    decode(&data)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encodes_power_on() {
        let frame = encode("PWR01");
        let mut want = Vec::new();
        want.extend_from_slice(b"ISCP");
        want.extend_from_slice(&[0, 0, 0, 16]);
        want.extend_from_slice(&[0, 0, 0, 8]);
        want.extend_from_slice(&[1, 0, 0, 0]);
        want.extend_from_slice(b"!1PWR01\r");
        assert_eq!(frame, want);
    }

    #[test]
    fn decode_strips_terminators() {
        assert_eq!(decode(b"!1PWR00\x1a\r\n").unwrap(), "PWR00");
        assert_eq!(decode(b"!1MVL2A\x1a").unwrap(), "MVL2A");
        assert!(decode(b"PWR00").is_err());
    }

    #[tokio::test]
    async fn reads_back_encoded_frame() {
        let frame = encode("AMT01");
        let mut cursor = frame.as_slice();
        assert_eq!(read_message(&mut cursor).await.unwrap(), "AMT01");
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let mut frame = encode("AMT01");
        frame[0] = b'X';
        let mut cursor = frame.as_slice();
        assert!(read_message(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn rejects_oversized_header() {
        let mut frame = encode("AMT01");
        frame[4..8].copy_from_slice(&0xFFFF_FFF0_u32.to_be_bytes());
        let mut cursor = frame.as_slice();
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{err:?}");
    }

    #[tokio::test]
    async fn skips_header_extension() {
        let mut frame = encode("PWR01");
        frame[4..8].copy_from_slice(&20_u32.to_be_bytes());
        frame.splice(16..16, [0u8; 4]);
        let mut cursor = frame.as_slice();
        assert_eq!(read_message(&mut cursor).await.unwrap(), "PWR01");
    }
}
