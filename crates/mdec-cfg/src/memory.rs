//! Byte-addressable read capability.

use mdec_isa::{Instruction, decode_all};
use tracing::warn;

/// Read access to the program image. Out-of-range reads return 0.
pub trait MemoryReader: Send + Sync {
    fn read8(&self, address: u32) -> u8;
    fn read16(&self, address: u32) -> u16;
    fn read32(&self, address: u32) -> u32;

    /// Decode the instructions in `[start, end)`.
    fn decode_range(&self, start: u32, end: u32) -> Vec<Instruction> {
        let words: Vec<u32> = (start..end)
            .step_by(Instruction::SIZE as usize)
            .map(|address| self.read32(address))
            .collect();
        decode_all(&words, start)
    }
}

/// Little-endian image of one contiguous region.
#[derive(Clone, Debug, Default)]
pub struct MemoryImage {
    base: u32,
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub const fn new(base: u32, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn from_words(base: u32, words: &[u32]) -> Self {
        let bytes = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        Self::new(base, bytes)
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u32 {
        let len = u32::try_from(self.bytes.len()).unwrap_or(u32::MAX);
        self.base.saturating_add(len)
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && address < self.end()
    }

    fn slice<const N: usize>(&self, address: u32) -> Option<[u8; N]> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let bytes = self.bytes.get(offset..offset.checked_add(N)?)?;
        bytes.try_into().ok()
    }

    fn read<const N: usize>(&self, address: u32) -> [u8; N] {
        self.slice(address).unwrap_or_else(|| {
            warn!(
                address = format_args!("{address:#010x}"),
                width = N,
                "read outside memory image"
            );
            [0; N]
        })
    }
}

impl MemoryReader for MemoryImage {
    fn read8(&self, address: u32) -> u8 {
        self.read::<1>(address)[0]
    }

    fn read16(&self, address: u32) -> u16 {
        u16::from_le_bytes(self.read(address))
    }

    fn read32(&self, address: u32) -> u32 {
        u32::from_le_bytes(self.read(address))
    }
}
