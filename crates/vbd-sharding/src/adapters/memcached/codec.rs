//! # Binary Protocol Codec
//!
//! Framing for the KV binary protocol: a fixed 24-byte header followed by
//! extras, key and value.
//!
//! ```text
//! 0      1       2..4     4         5         6..8            8..12     12..16   16..24
//! magic  opcode  key len  extras    datatype  vbucket/status  body len  opaque   cas
//! ```
//!
//! Alt responses (magic `0x18`) carry framing extras: byte 2 is the framing
//! extras length and byte 3 the key length.

use crate::domain::LocatorError;

/// Header size in bytes.
pub const HEADER_LEN: usize = 24;

/// Client request magic.
pub const MAGIC_REQUEST: u8 = 0x80;
/// Server response magic.
pub const MAGIC_RESPONSE: u8 = 0x81;
/// Server response with framing extras.
pub const MAGIC_ALT_RESPONSE: u8 = 0x18;

/// Largest body accepted from a server.
pub const MAX_BODY_LEN: u32 = 32 * 1024 * 1024;

/// Opcodes used by the node client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Read a document.
    Get = 0x00,
    /// Create a document if absent.
    Add = 0x02,
    /// Delete a document.
    Delete = 0x04,
    /// Feature negotiation.
    Hello = 0x1f,
    /// SASL authentication.
    SaslAuth = 0x21,
    /// Bind the connection to a bucket.
    SelectBucket = 0x89,
    /// Fetch the cluster topology.
    GetClusterConfig = 0xb5,
    /// Resolve a collection path to its id.
    GetCollectionId = 0xbb,
}

/// Response status codes.
pub mod status {
    /// Success.
    pub const SUCCESS: u16 = 0x0000;
    /// No document under this key.
    pub const KEY_ENOENT: u16 = 0x0001;
    /// Key exists (add) or cas mismatch (delete).
    pub const KEY_EEXISTS: u16 = 0x0002;
    /// Shard not owned by this node.
    pub const NOT_MY_VBUCKET: u16 = 0x0007;
    /// Authentication failed.
    pub const AUTH_ERROR: u16 = 0x0020;
    /// No access to the requested resource.
    pub const NO_ACCESS: u16 = 0x0024;
    /// Collection unknown to the node.
    pub const UNKNOWN_COLLECTION: u16 = 0x0088;
}

/// HELLO feature codes.
pub mod feature {
    /// Extended error messages.
    pub const XERROR: u16 = 0x0007;
    /// SELECT_BUCKET support.
    pub const SELECT_BUCKET: u16 = 0x0008;
    /// JSON datatype.
    pub const JSON: u16 = 0x000b;
    /// Collection-aware keys.
    pub const COLLECTIONS: u16 = 0x0012;
}

/// An outgoing request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    /// Opcode byte.
    pub opcode: u8,
    /// Target vbucket.
    pub vbucket: u16,
    /// Datatype bits of the value.
    pub datatype: u8,
    /// Echoed back by the server.
    pub opaque: u32,
    /// cas guard (0 = none).
    pub cas: u64,
    /// Extras section.
    pub extras: Vec<u8>,
    /// Key section.
    pub key: Vec<u8>,
    /// Value section.
    pub value: Vec<u8>,
}

impl Request {
    /// Empty request for `opcode`.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode: opcode as u8,
            ..Default::default()
        }
    }

    /// Serialize header and body.
    pub fn encode(&self) -> Result<Vec<u8>, LocatorError> {
        let key_len = u16::try_from(self.key.len())
            .map_err(|_| LocatorError::InvalidInput(format!("key of {} bytes", self.key.len())))?;
        let extras_len = u8::try_from(self.extras.len()).map_err(|_| {
            LocatorError::InvalidInput(format!("extras of {} bytes", self.extras.len()))
        })?;
        let body_len = u32::try_from(self.extras.len() + self.key.len() + self.value.len())
            .map_err(|_| LocatorError::InvalidInput("request body too large".to_string()))?;

        let mut buf = Vec::with_capacity(HEADER_LEN + body_len as usize);
        buf.push(MAGIC_REQUEST);
        buf.push(self.opcode);
        buf.extend_from_slice(&key_len.to_be_bytes());
        buf.push(extras_len);
        buf.push(self.datatype);
        buf.extend_from_slice(&self.vbucket.to_be_bytes());
        buf.extend_from_slice(&body_len.to_be_bytes());
        buf.extend_from_slice(&self.opaque.to_be_bytes());
        buf.extend_from_slice(&self.cas.to_be_bytes());
        buf.extend_from_slice(&self.extras);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        Ok(buf)
    }
}

/// Decoded response header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Opcode being answered.
    pub opcode: u8,
    /// Framing extras length (alt responses only).
    pub framing_extras_len: u8,
    /// Key length.
    pub key_len: u16,
    /// Extras length.
    pub extras_len: u8,
    /// Datatype bits of the value.
    pub datatype: u8,
    /// Status code.
    pub status: u16,
    /// Total body length.
    pub body_len: u32,
    /// Opaque from the request.
    pub opaque: u32,
    /// Document cas.
    pub cas: u64,
}

impl ResponseHeader {
    /// Parse a response header.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self, LocatorError> {
        let (framing_extras_len, key_len) = match bytes[0] {
            MAGIC_RESPONSE => (0, u16::from_be_bytes([bytes[2], bytes[3]])),
            MAGIC_ALT_RESPONSE => (bytes[2], u16::from(bytes[3])),
            other => {
                return Err(LocatorError::Protocol {
                    status: 0,
                    message: format!("unexpected magic 0x{other:02x}"),
                })
            }
        };

        let header = Self {
            opcode: bytes[1],
            framing_extras_len,
            key_len,
            extras_len: bytes[4],
            datatype: bytes[5],
            status: u16::from_be_bytes([bytes[6], bytes[7]]),
            body_len: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            opaque: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            cas: u64::from_be_bytes([
                bytes[16], bytes[17], bytes[18], bytes[19], bytes[20], bytes[21], bytes[22],
                bytes[23],
            ]),
        };

        let sections = u32::from(header.framing_extras_len)
            + u32::from(header.extras_len)
            + u32::from(header.key_len);
        if sections > header.body_len {
            return Err(LocatorError::Protocol {
                status: header.status,
                message: format!(
                    "body length {} shorter than its sections ({sections})",
                    header.body_len
                ),
            });
        }
        if header.body_len > MAX_BODY_LEN {
            return Err(LocatorError::Protocol {
                status: header.status,
                message: format!("body length {} exceeds limit", header.body_len),
            });
        }
        Ok(header)
    }
}

/// A complete response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Header fields.
    pub header: ResponseHeader,
    /// Extras section.
    pub extras: Vec<u8>,
    /// Key section.
    pub key: Vec<u8>,
    /// Value section.
    pub value: Vec<u8>,
}

impl Response {
    /// Split `body` into its sections. Framing extras are dropped.
    pub fn from_parts(header: ResponseHeader, body: Vec<u8>) -> Result<Self, LocatorError> {
        if body.len() != header.body_len as usize {
            return Err(LocatorError::Protocol {
                status: header.status,
                message: format!("expected {} body bytes, got {}", header.body_len, body.len()),
            });
        }
        let extras_start = usize::from(header.framing_extras_len);
        let key_start = extras_start + usize::from(header.extras_len);
        let value_start = key_start + usize::from(header.key_len);

        Ok(Self {
            header,
            extras: body[extras_start..key_start].to_vec(),
            key: body[key_start..value_start].to_vec(),
            value: body[value_start..].to_vec(),
        })
    }

    /// Status code.
    pub fn status(&self) -> u16 {
        self.header.status
    }

    /// Client flags from GET extras.
    pub fn flags(&self) -> u32 {
        match self.extras.get(..4) {
            Some(&[a, b, c, d]) => u32::from_be_bytes([a, b, c, d]),
            _ => 0,
        }
    }

    /// Server text for an error status (XERROR JSON or plain text).
    pub fn error_message(&self) -> String {
        if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&self.value) {
            if let Some(context) = json.pointer("/error/context").and_then(|c| c.as_str()) {
                return context.to_string();
            }
        }
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// Append `value` as unsigned LEB128.
pub fn encode_leb128(mut value: u32, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Key bytes prefixed with the collection id.
pub fn collection_key(collection_id: u32, id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(id.len() + 5);
    encode_leb128(collection_id, &mut key);
    key.extend_from_slice(id);
    key
}

/// ADD extras: flags then expiry (never expires).
pub fn add_extras(flags: u32) -> Vec<u8> {
    let mut extras = Vec::with_capacity(8);
    extras.extend_from_slice(&flags.to_be_bytes());
    extras.extend_from_slice(&0u32.to_be_bytes());
    extras
}

/// SASL PLAIN payload: `\0user\0password`.
pub fn sasl_plain(username: &str, password: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(username.len() + password.len() + 2);
    payload.push(0);
    payload.extend_from_slice(username.as_bytes());
    payload.push(0);
    payload.extend_from_slice(password.as_bytes());
    payload
}

/// HELLO value: each feature as a big-endian u16.
pub fn hello_features(features: &[u16]) -> Vec<u8> {
    features.iter().flat_map(|f| f.to_be_bytes()).collect()
}

/// Features granted in a HELLO response value. A trailing odd byte is
/// ignored.
pub fn parse_hello_features(value: &[u8]) -> Vec<u16> {
    value
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
