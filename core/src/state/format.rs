//! Save-state file header
//!
//! Every save state starts with two codec strings: the format tag and the
//! bank-switching type of the cartridge it was taken from. The machine
//! snapshot follows.

use crate::codec::{CodecError, Deserializer, Serializer};
use crate::machine::CartridgeIdentity;

/// Format tag written at the start of every save state
pub const FORMAT_TAG: &str = "06000000state";

/// Why a save state was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("state format tag {found:?} is not {FORMAT_TAG:?}")]
    IncompatibleFormat { found: Option<String> },

    #[error("state was saved from a {found:?} cartridge, current cartridge is {expected:?}")]
    CartridgeMismatch { expected: String, found: String },

    #[error("state data is invalid: {0}")]
    Codec(#[from] CodecError),
}

pub fn write_header(out: &mut Serializer, cartridge: &CartridgeIdentity) {
    out.put_string(FORMAT_TAG);
    out.put_string(cartridge.kind());
}

/// Check the header against the current cartridge
///
/// A tag that cannot even be decoded counts as an incompatible format.
pub fn read_header(
    input: &mut Deserializer<'_>,
    cartridge: &CartridgeIdentity,
) -> Result<(), FormatError> {
    let tag = input
        .get_string()
        .map_err(|_| FormatError::IncompatibleFormat { found: None })?;
    if tag != FORMAT_TAG {
        return Err(FormatError::IncompatibleFormat { found: Some(tag) });
    }

    let kind = input.get_string()?;
    if kind != cartridge.kind() {
        return Err(FormatError::CartridgeMismatch {
            expected: cartridge.kind().to_string(),
            found: kind,
        });
    }
    Ok(())
}

/// Header fields of a save state, read without a cartridge to compare to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub format_tag: String,
    pub cartridge_kind: String,
    pub payload_len: usize,
}

impl HeaderInfo {
    pub fn is_compatible(&self) -> bool {
        self.format_tag == FORMAT_TAG
    }
}

/// Describe a save state for inspection tools
pub fn inspect(bytes: &[u8]) -> Result<HeaderInfo, CodecError> {
    let mut input = Deserializer::new(bytes);
    let format_tag = input.get_string()?;
    let cartridge_kind = input.get_string()?;
    Ok(HeaderInfo {
        format_tag,
        cartridge_kind,
        payload_len: input.remaining(),
    })
}
