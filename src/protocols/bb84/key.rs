//! Key extraction from the retained sample.

use std::fmt;

use crate::error::ProtocolError;

/// Shared secret bits, in ascending position order.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EncryptionKey(Vec<bool>);

impl EncryptionKey {
    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .iter()
            .try_for_each(|&b| f.write_str(if b { "1" } else { "0" }))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey({self})")
    }
}

/// Takes up to `length` retained positions and looks up their bits.
///
/// The result is shorter than `length` when too few positions were retained;
/// positions outside `bits` are skipped.
pub fn derive_key(retained: &[usize], bits: &[bool], length: usize) -> EncryptionKey {
    EncryptionKey(
        retained
            .iter()
            .take(length)
            .filter_map(|&i| bits.get(i).copied())
            .collect(),
    )
}

/// Like [`derive_key`] but refuses to return fewer than `length` bits.
///
/// # Errors
///
/// `KeyTooShort` when the derived key would be truncated.
pub fn derive_exact_key(
    retained: &[usize],
    bits: &[bool],
    length: usize,
) -> Result<EncryptionKey, ProtocolError> {
    let key = derive_key(retained, bits, length);
    if key.len() < length {
        return Err(ProtocolError::KeyTooShort {
            available: key.len(),
            required: length,
        });
    }
    Ok(key)
}
