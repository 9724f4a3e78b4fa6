// hybridiso/src/iso/test_image.rs
//! In-memory ISO images for unit tests.

use crate::iso::boot_catalog::{
    BOOT_CATALOG_BOOT_ENTRY_HEADER_ID, BOOT_CATALOG_CHECKSUM_OFFSET, BOOT_CATALOG_ENTRY_SIZE,
    BOOT_CATALOG_HEADER_SIGNATURE, BOOT_CATALOG_VALIDATION_ENTRY_HEADER_ID, validation_checksum,
};
use crate::iso::volume_descriptor::{
    BOOT_CATALOG_POINTER_OFFSET, BOOT_RECORD_SECTOR, EL_TORITO_ID, ISO_ID, PVD_PATH_TABLE_OFFSET,
    PVD_SECTOR,
};
use crate::utils::{ISO_SECTOR_SIZE, Sector};
use std::io;
use std::path::Path;

pub const ISO_VOLUME_DESCRIPTOR_PRIMARY: u8 = 1;
pub const ISO_VOLUME_DESCRIPTOR_BOOT_RECORD: u8 = 0;
pub const ISO_VERSION: u8 = 1;
pub const PVD_VOLUME_ID_OFFSET: usize = 40;

#[derive(Clone)]
pub struct TestImage {
    data: Vec<u8>,
}

impl TestImage {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0u8; sectors * ISO_SECTOR_SIZE],
        }
    }

    pub fn with_primary_descriptor(mut self, path_table_sector: u32) -> Self {
        let mut pvd = [0u8; ISO_SECTOR_SIZE];
        pvd[0] = ISO_VOLUME_DESCRIPTOR_PRIMARY;
        pvd[1..6].copy_from_slice(ISO_ID);
        pvd[6] = ISO_VERSION;
        let mut volume_id = [b' '; 32];
        volume_id[..9].copy_from_slice(b"HYBRIDISO");
        pvd[PVD_VOLUME_ID_OFFSET..PVD_VOLUME_ID_OFFSET + 32].copy_from_slice(&volume_id);
        pvd[PVD_PATH_TABLE_OFFSET..PVD_PATH_TABLE_OFFSET + 4]
            .copy_from_slice(&path_table_sector.to_le_bytes());
        self.set_sector(PVD_SECTOR, &pvd);
        self
    }

    pub fn with_boot_record(mut self, boot_catalog_sector: u32) -> Self {
        let mut brvd = [0u8; ISO_SECTOR_SIZE];
        brvd[0] = ISO_VOLUME_DESCRIPTOR_BOOT_RECORD;
        brvd[1..6].copy_from_slice(ISO_ID);
        brvd[6] = ISO_VERSION;
        brvd[7..7 + EL_TORITO_ID.len()].copy_from_slice(EL_TORITO_ID);
        brvd[BOOT_CATALOG_POINTER_OFFSET..BOOT_CATALOG_POINTER_OFFSET + 4]
            .copy_from_slice(&boot_catalog_sector.to_le_bytes());
        self.set_sector(BOOT_RECORD_SECTOR, &brvd);
        self
    }

    pub fn with_descriptors(self, path_table_sector: u32, boot_catalog_sector: u32) -> Self {
        self.with_primary_descriptor(path_table_sector)
            .with_boot_record(boot_catalog_sector)
    }

    /// Places a catalog whose EFI entry directly follows the default entry.
    pub fn with_catalog(self, sector: u32) -> Self {
        self.with_sector(sector, &catalog_without_section_header())
    }

    pub fn with_sector(mut self, sector: u32, data: &[u8]) -> Self {
        self.set_sector(sector, data);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn sector(&self, sector: u32) -> Sector {
        let start = sector as usize * ISO_SECTOR_SIZE;
        let mut data = [0u8; ISO_SECTOR_SIZE];
        data.copy_from_slice(&self.data[start..start + ISO_SECTOR_SIZE]);
        data
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, &self.data)
    }

    fn set_sector(&mut self, sector: u32, data: &[u8]) {
        let start = sector as usize * ISO_SECTOR_SIZE;
        let mut padded = data.to_vec();
        padded.resize(ISO_SECTOR_SIZE, 0);
        self.data[start..start + ISO_SECTOR_SIZE].copy_from_slice(&padded);
    }
}

/// A validation entry with a correct checksum.
pub fn validation_entry() -> [u8; BOOT_CATALOG_ENTRY_SIZE] {
    let mut val = [0u8; BOOT_CATALOG_ENTRY_SIZE];
    val[0] = BOOT_CATALOG_VALIDATION_ENTRY_HEADER_ID;
    val[4..8].copy_from_slice(b"TEST");
    val[30..32].copy_from_slice(&BOOT_CATALOG_HEADER_SIGNATURE.to_le_bytes());
    let checksum = 0u16.wrapping_sub(validation_checksum(&val));
    val[BOOT_CATALOG_CHECKSUM_OFFSET..BOOT_CATALOG_CHECKSUM_OFFSET + 2]
        .copy_from_slice(&checksum.to_le_bytes());
    val
}

/// A bootable no-emulation entry.
pub fn boot_entry(boot_image_lba: u32, sectors: u16) -> [u8; BOOT_CATALOG_ENTRY_SIZE] {
    let mut entry = [0u8; BOOT_CATALOG_ENTRY_SIZE];
    entry[0] = BOOT_CATALOG_BOOT_ENTRY_HEADER_ID;
    entry[6..8].copy_from_slice(&sectors.to_le_bytes());
    entry[8..12].copy_from_slice(&boot_image_lba.to_le_bytes());
    entry
}

pub fn catalog_without_section_header() -> Sector {
    let mut catalog = [0u8; ISO_SECTOR_SIZE];
    catalog[..32].copy_from_slice(&validation_entry());
    catalog[32..64].copy_from_slice(&boot_entry(0x30, 4));
    catalog[64..96].copy_from_slice(&boot_entry(0x31, 0x20));
    catalog
}
