//! FAT12 engine.
//!
//! Stateless over the medium: every operation re-reads the sectors it
//! needs and writes mutations straight back, so there is no cache to keep
//! coherent. Kernel FS operations never re-enter (the kernel is
//! cooperative between ticks), which is what serialises the
//! read-modify-write cycles on FAT and directory sectors.
//!
//! FAT entries are 12-bit packed: an even cluster occupies the low twelve
//! bits of the little-endian word at `cluster * 1.5`, an odd cluster the
//! high twelve. Every FAT mutation is applied to each mirror copy, so the
//! copies stay byte-identical.

use super::{
    blockdev::{BlockDevice, SECTOR_SIZE},
    make_fat_name, DirEntry, DottedName, ATTR_VOLUME_LABEL, DIR_ENTRY_SIZE, ENTRY_DELETED,
    ENTRY_END, FAT_NAME_LEN, FatName,
};
use crate::error::{KernelError, KernelResult};

#[cfg(feature = "alloc")]
extern crate alloc;

/// FAT values at or above this mark the end of a chain.
pub const FAT_EOC_MIN: u16 = 0xFF8;
/// End-of-chain marker written by this driver.
pub const FAT_EOC: u16 = 0xFFF;
/// A free cluster.
pub const FAT_FREE: u16 = 0x000;
/// First cluster number that addresses the data area.
pub const FIRST_DATA_CLUSTER: u16 = 2;

/// Geometry parsed from the boot sector, plus the derived region starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiosParameterBlock {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub fat_size: u16,
    pub fat_start: u32,
    pub root_dir_start: u32,
    pub data_start: u32,
}

impl BiosParameterBlock {
    /// Decode the fields this driver uses from sector 0.
    pub fn parse(sector: &[u8; SECTOR_SIZE]) -> Self {
        let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]);
        let sectors_per_cluster = sector[13];
        let reserved_sectors = u16::from_le_bytes([sector[14], sector[15]]);
        let num_fats = sector[16];
        let root_entries = u16::from_le_bytes([sector[17], sector[18]]);
        let fat_size = u16::from_le_bytes([sector[22], sector[23]]);

        let fat_start = reserved_sectors as u32;
        let root_dir_start = fat_start + num_fats as u32 * fat_size as u32;
        let root_bytes = root_entries as u32 * DIR_ENTRY_SIZE as u32;
        let data_start = root_dir_start + root_bytes.div_ceil(SECTOR_SIZE as u32);

        Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_entries,
            fat_size,
            fat_start,
            root_dir_start,
            data_start,
        }
    }

    /// Sectors occupied by the root directory.
    pub fn root_sectors(&self) -> u32 {
        (self.root_entries as u32 * DIR_ENTRY_SIZE as u32).div_ceil(SECTOR_SIZE as u32)
    }

    /// Upper bound of the cluster scan.
    ///
    /// `fat_size * 512 * 2 / 3` slightly overestimates the addressable
    /// clusters; clamping to the data-area sector count would be tighter,
    /// but the scan range is kept bit-compatible with entries a formatter
    /// may have initialised.
    pub fn max_clusters(&self) -> u16 {
        ((self.fat_size as u32 * SECTOR_SIZE as u32 * 2) / 3) as u16
    }

    /// First LBA of the given data cluster.
    pub fn cluster_lba(&self, cluster: u16) -> u32 {
        self.data_start + (cluster - FIRST_DATA_CLUSTER) as u32 * self.sectors_per_cluster as u32
    }

    /// Bytes per cluster.
    pub fn cluster_bytes(&self) -> u32 {
        self.sectors_per_cluster as u32 * SECTOR_SIZE as u32
    }
}

/// A mounted FAT12 volume over a block device.
pub struct Fat12<D: BlockDevice> {
    device: D,
    bpb: BiosParameterBlock,
}

impl<D: BlockDevice> Fat12<D> {
    /// Read the boot sector and derive the region layout.
    pub fn mount(mut device: D) -> KernelResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        device.read_sector(0, &mut sector)?;
        let bpb = BiosParameterBlock::parse(&sector);
        Ok(Self { device, bpb })
    }

    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    /// Direct device access, for mirror checks and test fixtures.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    // -----------------------------------------------------------------------
    // FAT access
    // -----------------------------------------------------------------------

    /// Read the 12-bit FAT entry for `cluster` (from the first copy).
    pub fn fat_get(&mut self, cluster: u16) -> KernelResult<u16> {
        let byte_offset = cluster as u32 + cluster as u32 / 2;
        let lba = self.bpb.fat_start + byte_offset / SECTOR_SIZE as u32;
        let idx = (byte_offset % SECTOR_SIZE as u32) as usize;

        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(lba, &mut sector)?;
        // The two bytes of a 12-bit entry may straddle a sector boundary
        // only when idx == 511; FAT sizes used here keep entries inside
        // one sector, but read the neighbour defensively.
        let low = sector[idx];
        let high = if idx + 1 < SECTOR_SIZE {
            sector[idx + 1]
        } else {
            let mut next = [0u8; SECTOR_SIZE];
            self.device.read_sector(lba + 1, &mut next)?;
            next[0]
        };

        let value = if cluster & 1 == 1 {
            ((low >> 4) as u16 | (high as u16) << 4) & 0x0FFF
        } else {
            (low as u16 | ((high as u16 & 0x0F) << 8)) & 0x0FFF
        };
        Ok(value)
    }

    /// Write the 12-bit FAT entry for `cluster` into every FAT copy.
    ///
    /// The two bytes of an entry can straddle a sector boundary, so the
    /// update goes through a tiny two-sector window.
    fn fat_set(&mut self, cluster: u16, value: u16) -> KernelResult<()> {
        let value = value & 0x0FFF;
        let byte_offset = cluster as u32 + cluster as u32 / 2;

        for fat in 0..self.bpb.num_fats as u32 {
            let lba = self.bpb.fat_start
                + fat * self.bpb.fat_size as u32
                + byte_offset / SECTOR_SIZE as u32;
            let idx = (byte_offset % SECTOR_SIZE as u32) as usize;
            let straddles = idx + 1 >= SECTOR_SIZE;

            let mut first = [0u8; SECTOR_SIZE];
            let mut second = [0u8; SECTOR_SIZE];
            self.device.read_sector(lba, &mut first)?;
            if straddles {
                self.device.read_sector(lba + 1, &mut second)?;
            }

            let low = first[idx];
            let high = if straddles { second[0] } else { first[idx + 1] };
            let (low, high) = if cluster & 1 == 1 {
                // Odd: high nibble of the first byte, then eight bits.
                (
                    (low & 0x0F) | (((value & 0x00F) << 4) as u8),
                    ((value >> 4) & 0xFF) as u8,
                )
            } else {
                // Even: eight bits, then the low nibble of the next byte.
                (
                    (value & 0xFF) as u8,
                    (high & 0xF0) | (((value >> 8) & 0x0F) as u8),
                )
            };

            first[idx] = low;
            if straddles {
                second[0] = high;
            } else {
                first[idx + 1] = high;
            }
            self.device.write_sector(lba, &first)?;
            if straddles {
                self.device.write_sector(lba + 1, &second)?;
            }
        }
        Ok(())
    }

    /// Claim the first free cluster and mark it end-of-chain.
    fn alloc_cluster(&mut self) -> KernelResult<u16> {
        for cluster in FIRST_DATA_CLUSTER..self.bpb.max_clusters() {
            if self.fat_get(cluster)? == FAT_FREE {
                self.fat_set(cluster, FAT_EOC)?;
                return Ok(cluster);
            }
        }
        Err(KernelError::Full { resource: "disk" })
    }

    /// Walk the chain from `start`, freeing every entry.
    fn free_cluster_chain(&mut self, start: u16) -> KernelResult<()> {
        let mut cluster = start;
        while (FIRST_DATA_CLUSTER..FAT_EOC_MIN).contains(&cluster) {
            let next = self.fat_get(cluster)?;
            self.fat_set(cluster, FAT_FREE)?;
            cluster = next;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Root directory
    // -----------------------------------------------------------------------

    /// Locate `fatname`. Returns the sector LBA and byte offset of its
    /// 32-byte entry.
    fn find_dir_entry(&mut self, fatname: &FatName) -> KernelResult<Option<(u32, usize)>> {
        let mut sector = [0u8; SECTOR_SIZE];
        for s in 0..self.bpb.root_sectors() {
            let lba = self.bpb.root_dir_start + s;
            self.device.read_sector(lba, &mut sector)?;
            for off in (0..SECTOR_SIZE).step_by(DIR_ENTRY_SIZE) {
                match sector[off] {
                    ENTRY_END => return Ok(None),
                    ENTRY_DELETED => continue,
                    _ => {
                        if &sector[off..off + FAT_NAME_LEN] == fatname {
                            return Ok(Some((lba, off)));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Write `entry` into the first free (end or deleted) slot.
    fn create_dir_entry(&mut self, entry: &DirEntry) -> KernelResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for s in 0..self.bpb.root_sectors() {
            let lba = self.bpb.root_dir_start + s;
            self.device.read_sector(lba, &mut sector)?;
            for off in (0..SECTOR_SIZE).step_by(DIR_ENTRY_SIZE) {
                if sector[off] == ENTRY_END || sector[off] == ENTRY_DELETED {
                    sector[off..off + DIR_ENTRY_SIZE].copy_from_slice(&entry.encode());
                    return self.device.write_sector(lba, &sector);
                }
            }
        }
        Err(KernelError::Full {
            resource: "root directory",
        })
    }

    /// Decode the entry at a previously found position.
    fn entry_at(&mut self, lba: u32, off: usize) -> KernelResult<DirEntry> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(lba, &mut sector)?;
        Ok(DirEntry::decode(&sector[off..off + DIR_ENTRY_SIZE]))
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Read `name` into `buf`, truncated to `min(file size, buf.len())`.
    /// Returns the number of bytes copied.
    pub fn read(&mut self, name: &str, buf: &mut [u8]) -> KernelResult<usize> {
        let fatname = make_fat_name(name)?;
        let (lba, off) = self
            .find_dir_entry(&fatname)?
            .ok_or(KernelError::NotFound { resource: "file" })?;
        let entry = self.entry_at(lba, off)?;

        let limit = (entry.size as usize).min(buf.len());
        let mut cluster = entry.first_cluster;
        let mut read = 0usize;
        let mut sector = [0u8; SECTOR_SIZE];

        while (FIRST_DATA_CLUSTER..FAT_EOC_MIN).contains(&cluster) && read < limit {
            let base = self.bpb.cluster_lba(cluster);
            for i in 0..self.bpb.sectors_per_cluster as u32 {
                self.device.read_sector(base + i, &mut sector)?;
                let to_copy = SECTOR_SIZE.min(limit - read);
                buf[read..read + to_copy].copy_from_slice(&sector[..to_copy]);
                read += to_copy;
                if read >= limit {
                    break;
                }
            }
            cluster = self.fat_get(cluster)?;
        }
        Ok(read)
    }

    /// Size in bytes recorded in the directory entry for `name`.
    pub fn file_size(&mut self, name: &str) -> KernelResult<u32> {
        let fatname = make_fat_name(name)?;
        let (lba, off) = self
            .find_dir_entry(&fatname)?
            .ok_or(KernelError::NotFound { resource: "file" })?;
        Ok(self.entry_at(lba, off)?.size)
    }

    /// Invoke `cb(name, size)` for every live file entry, in directory
    /// order. Stops at the end-of-directory marker; deleted entries and
    /// the volume label are skipped.
    pub fn ls(&mut self, mut cb: impl FnMut(&str, u32)) -> KernelResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for s in 0..self.bpb.root_sectors() {
            let lba = self.bpb.root_dir_start + s;
            self.device.read_sector(lba, &mut sector)?;
            for off in (0..SECTOR_SIZE).step_by(DIR_ENTRY_SIZE) {
                let first = sector[off];
                if first == ENTRY_END {
                    return Ok(());
                }
                if first == ENTRY_DELETED || sector[off + 11] & ATTR_VOLUME_LABEL != 0 {
                    continue;
                }
                let entry = DirEntry::decode(&sector[off..off + DIR_ENTRY_SIZE]);
                let dotted = DottedName::from_fat_name(&entry.name);
                cb(dotted.as_str(), entry.size);
            }
        }
        Ok(())
    }

    /// Remove `name`: free its cluster chain, then tombstone the entry.
    pub fn delete(&mut self, name: &str) -> KernelResult<()> {
        let fatname = make_fat_name(name)?;
        let (lba, off) = self
            .find_dir_entry(&fatname)?
            .ok_or(KernelError::NotFound { resource: "file" })?;
        let entry = self.entry_at(lba, off)?;

        if entry.first_cluster >= FIRST_DATA_CLUSTER {
            self.free_cluster_chain(entry.first_cluster)?;
        }

        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(lba, &mut sector)?;
        sector[off] = ENTRY_DELETED;
        self.device.write_sector(lba, &sector)
    }

    /// Create or replace `name` with `data`.
    ///
    /// Any existing file is deleted first. A zero-length write produces a
    /// directory entry with first-cluster 0 and no chain. On cluster
    /// exhaustion the partial chain is released and the disk reported
    /// full.
    pub fn write(&mut self, name: &str, data: &[u8]) -> KernelResult<()> {
        let fatname = make_fat_name(name)?;
        match self.delete(name) {
            Ok(()) => {}
            Err(KernelError::NotFound { .. }) => {}
            Err(other) => return Err(other),
        }

        if data.is_empty() {
            return self.create_dir_entry(&DirEntry::file(fatname, 0, 0));
        }

        let mut first_cluster = 0u16;
        let mut prev_cluster = 0u16;
        let mut remaining = data.len();
        let mut src = 0usize;
        let mut sector = [0u8; SECTOR_SIZE];

        while remaining > 0 {
            let cluster = match self.alloc_cluster() {
                Ok(c) => c,
                Err(err) => {
                    if first_cluster != 0 {
                        self.free_cluster_chain(first_cluster)?;
                    }
                    return Err(err);
                }
            };
            if first_cluster == 0 {
                first_cluster = cluster;
            }
            if prev_cluster != 0 {
                self.fat_set(prev_cluster, cluster)?;
            }
            prev_cluster = cluster;

            let base = self.bpb.cluster_lba(cluster);
            for s in 0..self.bpb.sectors_per_cluster as u32 {
                let to_copy = remaining.min(SECTOR_SIZE);
                sector[..to_copy].copy_from_slice(&data[src..src + to_copy]);
                sector[to_copy..].fill(0);
                self.device.write_sector(base + s, &sector)?;
                src += to_copy;
                remaining -= to_copy;
                if remaining == 0 {
                    break;
                }
            }
        }

        self.fat_set(prev_cluster, FAT_EOC)?;

        let entry = DirEntry::file(fatname, first_cluster, data.len() as u32);
        if let Err(err) = self.create_dir_entry(&entry) {
            self.free_cluster_chain(first_cluster)?;
            return Err(err);
        }
        Ok(())
    }

    /// Append `data` to `name`, creating the file if absent.
    ///
    /// Naive by contract: the old content is read into a heap buffer, the
    /// concatenation is written back as a fresh file. The buffer is never
    /// released; the kernel heap is bump-only.
    #[cfg(feature = "alloc")]
    pub fn append(&mut self, name: &str, data: &[u8]) -> KernelResult<()> {
        use alloc::vec;

        let fatname = make_fat_name(name)?;
        let old_size = match self.find_dir_entry(&fatname)? {
            Some((lba, off)) => self.entry_at(lba, off)?.size as usize,
            None => 0,
        };

        let mut buf = vec![0u8; old_size + data.len()];
        if old_size > 0 && self.read(name, &mut buf[..old_size])? != old_size {
            return Err(KernelError::Invalid { what: "file size" });
        }
        buf[old_size..].copy_from_slice(data);
        self.write(name, &buf)
    }

    /// Rename `old` to `new` in place. Fails if `new` already exists.
    pub fn rename(&mut self, old: &str, new: &str) -> KernelResult<()> {
        let fat_old = make_fat_name(old)?;
        let fat_new = make_fat_name(new)?;

        if self.find_dir_entry(&fat_new)?.is_some() {
            return Err(KernelError::Exists { resource: "file" });
        }
        let (lba, off) = self
            .find_dir_entry(&fat_old)?
            .ok_or(KernelError::NotFound { resource: "file" })?;

        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(lba, &mut sector)?;
        sector[off..off + FAT_NAME_LEN].copy_from_slice(&fat_new);
        self.device.write_sector(lba, &sector)
    }

    /// Bytes available on the volume: free FAT entries times cluster size.
    pub fn free_space(&mut self) -> KernelResult<u32> {
        let mut free_clusters = 0u32;
        for cluster in FIRST_DATA_CLUSTER..self.bpb.max_clusters() {
            if self.fat_get(cluster)? == FAT_FREE {
                free_clusters += 1;
            }
        }
        Ok(free_clusters * self.bpb.cluster_bytes())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::blockdev::RamBlockDevice;

    /// Format a blank volume the way a floppy formatter would: BPB in
    /// sector 0, zeroed FATs and root directory.
    pub(crate) fn format_volume(
        num_fats: u8,
        sectors_per_cluster: u8,
        fat_size: u16,
        root_entries: u16,
    ) -> RamBlockDevice {
        let mut dev = RamBlockDevice::new(2880);
        let mut boot = [0u8; SECTOR_SIZE];
        boot[11..13].copy_from_slice(&512u16.to_le_bytes());
        boot[13] = sectors_per_cluster;
        boot[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved
        boot[16] = num_fats;
        boot[17..19].copy_from_slice(&root_entries.to_le_bytes());
        boot[22..24].copy_from_slice(&fat_size.to_le_bytes());
        dev.write_sector(0, &boot).unwrap();
        dev
    }

    pub(crate) fn mounted() -> Fat12<RamBlockDevice> {
        Fat12::mount(format_volume(2, 1, 9, 224)).unwrap()
    }

    #[test]
    fn test_bpb_parse_derives_region_layout() {
        let mut fs = mounted();
        let bpb = *fs.bpb();
        assert_eq!(bpb.bytes_per_sector, 512);
        assert_eq!(bpb.sectors_per_cluster, 1);
        assert_eq!(bpb.num_fats, 2);
        assert_eq!(bpb.fat_start, 1);
        assert_eq!(bpb.root_dir_start, 1 + 2 * 9);
        // 224 entries * 32 bytes = 14 sectors of root directory.
        assert_eq!(bpb.data_start, 19 + 14);
        assert_eq!(bpb.root_sectors(), 14);
        assert_eq!(fs.free_space().unwrap() % 512, 0);
    }

    #[test]
    fn test_fat_packing_even_cluster() {
        let mut fs = mounted();
        fs.fat_set(2, 0x123).unwrap();

        let mut sector = [0u8; SECTOR_SIZE];
        fs.device_mut().read_sector(1, &mut sector).unwrap();
        // Even cluster: low byte, then the low nibble of the next byte.
        assert_eq!(sector[3], 0x23);
        assert_eq!(sector[4] & 0x0F, 0x01);
        assert_eq!(fs.fat_get(2).unwrap(), 0x123);
    }

    #[test]
    fn test_fat_packing_odd_cluster() {
        let mut fs = mounted();
        fs.fat_set(3, 0xABC).unwrap();

        let mut sector = [0u8; SECTOR_SIZE];
        fs.device_mut().read_sector(1, &mut sector).unwrap();
        // Odd cluster: high nibble of byte 4, then byte 5.
        assert_eq!(sector[4] & 0xF0, 0xC0);
        assert_eq!(sector[5], 0xAB);
        assert_eq!(fs.fat_get(3).unwrap(), 0xABC);
    }

    #[test]
    fn test_fat_set_preserves_neighbours() {
        let mut fs = mounted();
        fs.fat_set(2, 0xFFF).unwrap();
        fs.fat_set(3, 0x456).unwrap();
        fs.fat_set(4, 0x789).unwrap();

        assert_eq!(fs.fat_get(2).unwrap(), 0xFFF);
        assert_eq!(fs.fat_get(3).unwrap(), 0x456);
        assert_eq!(fs.fat_get(4).unwrap(), 0x789);

        fs.fat_set(3, 0x000).unwrap();
        assert_eq!(fs.fat_get(2).unwrap(), 0xFFF);
        assert_eq!(fs.fat_get(4).unwrap(), 0x789);
    }

    #[test]
    fn test_fat_roundtrip_across_values() {
        let mut fs = mounted();
        for (cluster, value) in [(2u16, 0x001u16), (5, 0xFF8), (8, 0x800), (9, 0x0FF)] {
            fs.fat_set(cluster, value).unwrap();
            assert_eq!(fs.fat_get(cluster).unwrap(), value);
        }
    }

    #[test]
    fn test_fat_copies_stay_identical() {
        let mut fs = mounted();
        fs.write("b", b"0123456789ABCDEF").unwrap();

        let fat_size = fs.bpb().fat_size as u32;
        let mut first = [0u8; SECTOR_SIZE];
        let mut second = [0u8; SECTOR_SIZE];
        for s in 0..fat_size {
            fs.device_mut().read_sector(1 + s, &mut first).unwrap();
            fs.device_mut()
                .read_sector(1 + fat_size + s, &mut second)
                .unwrap();
            assert_eq!(first, second, "FAT copies diverge in sector {}", s);
        }
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let mut fs = mounted();
        fs.write("hello.txt", b"hi").unwrap();

        let mut buf = [0u8; 16];
        let read = fs.read("hello.txt", &mut buf).unwrap();
        assert_eq!(read, 2);
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn test_multi_cluster_file_roundtrip() {
        let mut fs = mounted();
        let mut data = [0u8; 1300];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        fs.write("big.bin", &data).unwrap();

        let mut buf = [0u8; 1300];
        assert_eq!(fs.read("big.bin", &mut buf).unwrap(), 1300);
        assert_eq!(buf, data);
    }

    #[test]
    fn test_read_truncates_to_buffer() {
        let mut fs = mounted();
        fs.write("file.txt", b"a longer piece of content").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(fs.read("file.txt", &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"a longer");
    }

    #[test]
    fn test_read_missing_file_fails() {
        let mut fs = mounted();
        let mut buf = [0u8; 4];
        assert_eq!(
            fs.read("nope.txt", &mut buf),
            Err(KernelError::NotFound { resource: "file" })
        );
    }

    #[test]
    fn test_delete_frees_chain_and_hides_file() {
        let mut fs = mounted();
        fs.write("doomed.txt", &[7u8; 1024]).unwrap();

        // Two clusters were chained for 1024 bytes at spc=1.
        assert_ne!(fs.fat_get(2).unwrap(), FAT_FREE);
        assert_ne!(fs.fat_get(3).unwrap(), FAT_FREE);

        fs.delete("doomed.txt").unwrap();
        assert_eq!(fs.fat_get(2).unwrap(), FAT_FREE);
        assert_eq!(fs.fat_get(3).unwrap(), FAT_FREE);

        let mut buf = [0u8; 4];
        assert!(fs.read("doomed.txt", &mut buf).is_err());
    }

    #[test]
    fn test_deleted_clusters_are_reused() {
        let mut fs = mounted();
        fs.write("hello.txt", b"hi").unwrap();
        fs.delete("hello.txt").unwrap();
        fs.write("a.txt", b"xyz").unwrap();

        // The first data cluster is recycled for the new file.
        let lba = fs.bpb().cluster_lba(2);
        let mut sector = [0u8; SECTOR_SIZE];
        fs.device_mut().read_sector(lba, &mut sector).unwrap();
        assert_eq!(&sector[..3], b"xyz");
        assert!(sector[3..8].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_length_write_creates_entry() {
        let mut fs = mounted();
        fs.write("x", &[]).unwrap();

        let mut seen = alloc::vec::Vec::new();
        fs.ls(|name, size| seen.push((alloc::string::String::from(name), size)))
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "X");
        assert_eq!(seen[0].1, 0);

        // No chain: the entry records cluster 0 and reads back empty.
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("x", &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_cluster_granularity_boundary() {
        let mut fs = mounted();
        let cluster_bytes = fs.bpb().cluster_bytes() as usize;
        let free_before = fs.free_space().unwrap();

        fs.write("exact.bin", &alloc::vec![1u8; cluster_bytes]).unwrap();
        let after_one = fs.free_space().unwrap();
        assert_eq!(free_before - after_one, cluster_bytes as u32);

        fs.write("plus1.bin", &alloc::vec![1u8; cluster_bytes + 1]).unwrap();
        let after_two = fs.free_space().unwrap();
        assert_eq!(after_one - after_two, 2 * cluster_bytes as u32);
    }

    #[test]
    fn test_append_concatenates() {
        let mut fs = mounted();
        fs.write("log.txt", b"first ").unwrap();
        fs.append("log.txt", b"second").unwrap();

        let mut buf = [0u8; 32];
        let read = fs.read("log.txt", &mut buf).unwrap();
        assert_eq!(&buf[..read], b"first second");
    }

    #[test]
    fn test_append_creates_missing_file() {
        let mut fs = mounted();
        fs.append("new.txt", b"data").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(fs.read("new.txt", &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"data");
    }

    #[test]
    fn test_rename_moves_name_keeps_content() {
        let mut fs = mounted();
        fs.write("old.txt", b"payload").unwrap();
        fs.rename("old.txt", "new.txt").unwrap();

        let mut buf = [0u8; 16];
        assert!(fs.read("old.txt", &mut buf).is_err());
        assert_eq!(fs.read("new.txt", &mut buf).unwrap(), 7);
        assert_eq!(&buf[..7], b"payload");
    }

    #[test]
    fn test_rename_refuses_existing_destination() {
        let mut fs = mounted();
        fs.write("a.txt", b"a").unwrap();
        fs.write("b.txt", b"b").unwrap();
        assert_eq!(
            fs.rename("a.txt", "b.txt"),
            Err(KernelError::Exists { resource: "file" })
        );
    }

    #[test]
    fn test_rename_missing_source_fails() {
        let mut fs = mounted();
        assert!(fs.rename("ghost.txt", "real.txt").is_err());
    }

    #[test]
    fn test_free_space_decreases_by_cluster_multiple() {
        let mut fs = mounted();
        let before = fs.free_space().unwrap();
        fs.write("f.bin", &[9u8; 700]).unwrap();
        let after = fs.free_space().unwrap();

        let cluster_bytes = fs.bpb().cluster_bytes();
        let needed = 700u32.div_ceil(cluster_bytes) * cluster_bytes;
        assert!(before - after >= needed);
        assert_eq!((before - after) % cluster_bytes, 0);
    }
}
