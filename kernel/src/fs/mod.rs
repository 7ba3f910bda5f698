//! FAT12 filesystem.
//!
//! The on-medium format is classic FAT12: a BIOS parameter block in sector
//! 0, `num_fats` mirrored 12-bit allocation tables, a fixed root directory
//! of 32-byte 8.3 entries, then the data area in clusters. The engine in
//! [`fat12`] implements it byte-for-byte over any [`BlockDevice`]; this
//! module owns the 8.3 name rules and the directory-entry codec, plus the
//! mounted global instance the rest of the kernel calls into.

pub mod blockdev;
pub mod fat12;

pub use blockdev::{BlockDevice, SECTOR_SIZE};
pub use fat12::Fat12;

use spin::Mutex;

use crate::{
    drivers::ata::AtaDisk,
    error::{KernelError, KernelResult},
    sync::once_lock::GlobalState,
};

/// Length of a padded 8.3 name: eight stem bytes, three extension bytes.
pub const FAT_NAME_LEN: usize = 11;

/// An 8.3 name in its on-disk padded form.
pub type FatName = [u8; FAT_NAME_LEN];

/// Bytes per directory entry.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Attribute bit for ordinary files.
pub const ATTR_ARCHIVE: u8 = 0x20;
/// Attribute bit for the volume label pseudo-entry.
pub const ATTR_VOLUME_LABEL: u8 = 0x08;
/// Attribute bit for subdirectories (recognised, never created here).
pub const ATTR_DIRECTORY: u8 = 0x10;

/// First byte of a deleted directory entry.
pub const ENTRY_DELETED: u8 = 0xE5;
/// First byte marking the end of the used directory region.
pub const ENTRY_END: u8 = 0x00;

/// Normalise `input` into the padded 8.3 form.
///
/// Lowercase letters are uppercased, the stem ends at the first `'.'`, and
/// both parts are space-padded. Characters beyond eight stem or three
/// extension bytes are silently discarded. An empty stem has no on-disk
/// representation and is rejected.
pub fn make_fat_name(input: &str) -> KernelResult<FatName> {
    let mut name: FatName = [b' '; FAT_NAME_LEN];
    let bytes = input.as_bytes();

    let mut i = 0;
    let mut out = 0;
    while i < bytes.len() && bytes[i] != b'.' && out < 8 {
        name[out] = bytes[i].to_ascii_uppercase();
        i += 1;
        out += 1;
    }
    if out == 0 {
        return Err(KernelError::Invalid { what: "file name" });
    }
    // Skip the rest of an overlong stem up to the separator.
    while i < bytes.len() && bytes[i] != b'.' {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        for j in 0..3 {
            if i >= bytes.len() {
                break;
            }
            name[8 + j] = bytes[i].to_ascii_uppercase();
            i += 1;
        }
    }
    Ok(name)
}

/// A reconstituted dotted name, at most twelve bytes (`XXXXXXXX.YYY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DottedName {
    buf: [u8; 12],
    len: usize,
}

impl DottedName {
    /// Undo the padding: trim spaces, insert the dot when an extension
    /// exists.
    pub fn from_fat_name(name: &FatName) -> Self {
        let mut buf = [0u8; 12];
        let mut len = 0;
        for &byte in &name[..8] {
            if byte != b' ' {
                buf[len] = byte;
                len += 1;
            }
        }
        if name[8..].iter().any(|&b| b != b' ') {
            buf[len] = b'.';
            len += 1;
            for &byte in &name[8..] {
                if byte != b' ' {
                    buf[len] = byte;
                    len += 1;
                }
            }
        }
        Self { buf, len }
    }

    pub fn as_str(&self) -> &str {
        // Directory entries hold ASCII; anything else came off a foreign
        // disk and is replaced rather than propagated.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("?")
    }
}

/// One decoded root-directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: FatName,
    pub attr: u8,
    pub first_cluster: u16,
    pub size: u32,
}

impl DirEntry {
    /// A fresh file entry (attribute 0x20).
    pub fn file(name: FatName, first_cluster: u16, size: u32) -> Self {
        Self {
            name,
            attr: ATTR_ARCHIVE,
            first_cluster,
            size,
        }
    }

    /// Pack into the 32-byte on-disk layout: name, attribute, ten reserved
    /// zero bytes, first-cluster low word at offset 26, size at offset 28.
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[..FAT_NAME_LEN].copy_from_slice(&self.name);
        raw[11] = self.attr;
        raw[26] = (self.first_cluster & 0xFF) as u8;
        raw[27] = (self.first_cluster >> 8) as u8;
        raw[28..32].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; FAT_NAME_LEN];
        name.copy_from_slice(&raw[..FAT_NAME_LEN]);
        Self {
            name,
            attr: raw[11],
            first_cluster: raw[26] as u16 | ((raw[27] as u16) << 8),
            size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }
}

// ---------------------------------------------------------------------------
// Mounted global instance
// ---------------------------------------------------------------------------

static FILESYSTEM: GlobalState<Mutex<Fat12<AtaDisk>>> = GlobalState::new();

/// Mount the FAT12 volume on the primary master. Called once during boot.
pub fn init() -> KernelResult<()> {
    let fs = Fat12::mount(AtaDisk::primary_master())?;
    FILESYSTEM
        .init(Mutex::new(fs))
        .map_err(|_| KernelError::AlreadyInitialized {
            subsystem: "filesystem",
        })?;
    log::info!("fs: FAT12 volume mounted");
    Ok(())
}

/// Run `f` against the mounted filesystem.
pub fn with_fs<R>(f: impl FnOnce(&mut Fat12<AtaDisk>) -> KernelResult<R>) -> KernelResult<R> {
    FILESYSTEM
        .with(|mtx| f(&mut mtx.lock()))
        .unwrap_or(Err(KernelError::NotInitialized {
            subsystem: "filesystem",
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_fat_name_pads_both_parts() {
        assert_eq!(make_fat_name("a.b").unwrap(), *b"A       B  ");
        assert_eq!(make_fat_name("hello.txt").unwrap(), *b"HELLO   TXT");
        assert_eq!(make_fat_name("KERNEL").unwrap(), *b"KERNEL     ");
    }

    #[test]
    fn test_make_fat_name_truncates_silently() {
        assert_eq!(
            make_fat_name("verylongname.extension").unwrap(),
            *b"VERYLONGEXT"
        );
        assert_eq!(make_fat_name("abcdefghij").unwrap(), *b"ABCDEFGH   ");
    }

    #[test]
    fn test_make_fat_name_rejects_empty_stem() {
        assert!(make_fat_name("").is_err());
        assert!(make_fat_name(".txt").is_err());
    }

    #[test]
    fn test_dotted_name_roundtrip() {
        let fat = make_fat_name("readme.txt").unwrap();
        assert_eq!(DottedName::from_fat_name(&fat).as_str(), "README.TXT");

        let bare = make_fat_name("kernel").unwrap();
        assert_eq!(DottedName::from_fat_name(&bare).as_str(), "KERNEL");
    }

    #[test]
    fn test_dir_entry_roundtrip() {
        let entry = DirEntry::file(make_fat_name("readme.txt").unwrap(), 7, 123);
        let raw = entry.encode();

        assert_eq!(&raw[..11], b"README  TXT");
        assert_eq!(raw[11], ATTR_ARCHIVE);
        // Reserved region stays zero.
        assert!(raw[12..26].iter().all(|&b| b == 0));
        assert_eq!(raw[26], 7);
        assert_eq!(raw[27], 0);
        assert_eq!(&raw[28..32], &123u32.to_le_bytes());

        let decoded = DirEntry::decode(&raw);
        assert_eq!(decoded, entry);
    }
}
