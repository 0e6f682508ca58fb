//! Stateless capability tokens.
//!
//! A token is 24 raw bytes: three 8-byte blocks, each encrypted independently
//! with a 64-bit block cipher keyed by the current 16-byte access key, then
//! URL-safe base64. Block 0 binds the token to the key (a fixed permutation
//! of key bytes) and carries the kind; block 1 is the resource id, block 2
//! the issue time, both big-endian.
//!
//! Nothing is stored server side. Possession of a string that decrypts
//! cleanly under the *current* key is the whole credential, which is why
//! rotating the key revokes everything at once.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{DateTime, Utc};
use idea::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use idea::Idea;

use crate::{keyring::KEY_LEN, Error, Result};

pub const TOKEN_LEN: usize = 24;

/// Key bytes mirrored into block 0, in this order. Not a MAC: it proves the
/// token was minted under the current key with a false-accept chance of one
/// in 2^56, which is the accepted trade for a 24-byte token.
const KEY_PERMUTATION: [usize; 7] = [1, 3, 4, 5, 2, 0, 9];

/// What a token grants. The wire byte 0 is reserved as an invalid sentinel
/// so an all-zero block never verifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    /// Read the draft buffer (resource id 0) or a note, short lived.
    Preview = 1,
    /// Read a note via the owner's own list links.
    View = 2,
    /// Read a note via a link handed to someone else.
    Share = 3,
}

impl TokenKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Preview),
            2 => Some(Self::View),
            3 => Some(Self::Share),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Decoded token contents. `resource_id` 0 addresses the draft buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub resource_id: u64,
    /// Issue time, unix seconds.
    pub issued_at: i64,
}

/// Validity windows per kind, in minutes. Zero means the kind never expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ttls {
    pub preview_min: u32,
    pub view_min: u32,
    pub share_min: u32,
}

impl Ttls {
    fn minutes_for(&self, kind: TokenKind) -> u32 {
        match kind {
            TokenKind::Preview => self.preview_min,
            TokenKind::View => self.view_min,
            TokenKind::Share => self.share_min,
        }
    }
}

impl Token {
    pub fn is_valid(&self, ttls: &Ttls, now: DateTime<Utc>) -> bool {
        let window = ttls.minutes_for(self.kind);
        if window == 0 {
            return true;
        }
        self.issued_at + i64::from(window) * 60 > now.timestamp()
    }
}

/// Mint a token string for `resource_id` under the given key.
pub fn issue(
    key: &[u8; KEY_LEN],
    kind: TokenKind,
    resource_id: u64,
    issued_at: DateTime<Utc>,
) -> String {
    let cipher = Idea::new(GenericArray::from_slice(key));

    let mut raw = [0u8; TOKEN_LEN];
    for (i, &p) in KEY_PERMUTATION.iter().enumerate() {
        raw[i] = key[p];
    }
    raw[7] = kind.as_byte();
    raw[8..16].copy_from_slice(&resource_id.to_be_bytes());
    raw[16..24].copy_from_slice(&issued_at.timestamp().to_be_bytes());

    for block in raw.chunks_exact_mut(8) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    URL_SAFE.encode(raw)
}

/// Decode and verify a token string against the current key.
///
/// Every failure collapses to [`Error::Token`]: callers (and clients) never
/// learn whether the alphabet, length, key binding or kind byte tripped.
pub fn decode(key: &[u8; KEY_LEN], s: &str) -> Result<Token> {
    let bytes = URL_SAFE.decode(s).map_err(|_| Error::Token)?;
    if bytes.len() != TOKEN_LEN {
        return Err(Error::Token);
    }

    let mut raw = [0u8; TOKEN_LEN];
    raw.copy_from_slice(&bytes);

    let cipher = Idea::new(GenericArray::from_slice(key));
    for block in raw.chunks_exact_mut(8) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    for (i, &p) in KEY_PERMUTATION.iter().enumerate() {
        if raw[i] != key[p] {
            return Err(Error::Token);
        }
    }
    let kind = TokenKind::from_byte(raw[7]).ok_or(Error::Token)?;

    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[8..16]);
    let resource_id = u64::from_be_bytes(buf);
    buf.copy_from_slice(&raw[16..24]);
    let issued_at = i64::from_be_bytes(buf);

    Ok(Token {
        kind,
        resource_id,
        issued_at,
    })
}
