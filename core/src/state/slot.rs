//! Save-state slots

use std::fmt;
use std::path::{Path, PathBuf};

use crate::machine::CartridgeIdentity;

/// One of the ten per-cartridge save-state slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Slot(u8);

impl Slot {
    pub const COUNT: u8 = 10;

    /// `None` unless `index < 10`
    pub fn new(index: u8) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// The following slot, wrapping from 9 to 0
    pub fn next(self) -> Self {
        Self((self.0 + 1) % Self::COUNT)
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..Self::COUNT).map(Slot)
    }

    /// `<state_dir>/<cartridge name>.st<slot>`
    pub fn path(self, state_dir: &Path, cartridge: &CartridgeIdentity) -> PathBuf {
        state_dir.join(format!("{}.st{}", cartridge.file_stem(), self.0))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Slot {
    type Error = u8;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or(index)
    }
}
