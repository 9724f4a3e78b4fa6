// hybridiso/src/iso/volume_descriptor.rs
use crate::error::{IsoError, Result};
use crate::utils::{ISO_SECTOR_SIZE, Sector, read_sector};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

pub const PVD_SECTOR: u32 = 0x10;
pub const BOOT_RECORD_SECTOR: u32 = 0x11;

pub const ISO_ID: &[u8] = b"CD001";
pub const EL_TORITO_ID: &[u8] = b"EL TORITO SPECIFICATION";
pub const TERMINATOR_ID: &[u8] = b"TEA01";

/// Descriptor prefix that holds the `CD001` standard identifier.
pub const VOLUME_ID_LENGTH: usize = 6;
/// Descriptor prefix that holds the El Torito boot system identifier.
pub const BOOT_RECORD_ID_LENGTH: usize = 0x1E;

pub const PVD_PATH_TABLE_OFFSET: usize = 0x8C;
pub const BOOT_CATALOG_POINTER_OFFSET: usize = 0x47;

pub const MIN_PATH_TABLE_SECTOR: u32 = 0x11;
pub const MIN_BOOT_CATALOG_SECTOR: u32 = 0x12;

/// Layout information of an El Torito bootable ISO9660 image.
///
/// Everything is re-read from the image on each call; nothing is cached.
/// Unreadable fields are left empty or zero and rejected by [`IsoMetadata::validate`].
#[derive(Clone, Debug)]
pub struct IsoMetadata {
    pub volume_descriptor: Option<Sector>,
    pub volume_id: Vec<u8>,
    pub boot_record: Option<Sector>,
    pub boot_record_id: Vec<u8>,
    pub path_table_sector: u32,
    pub boot_catalog_sector: u32,
    pub boot_catalog: Option<Sector>,
}

impl IsoMetadata {
    /// Reads the descriptors and the boot catalog from the image at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let mut iso = File::open(path)?;
        Ok(Self::read_from(&mut iso))
    }

    /// Reads the metadata and rejects images that are not bootable ISO9660.
    pub fn read_validated(path: &Path) -> Result<Self> {
        let metadata = Self::read(path)?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn read_from<R: Read + Seek>(iso: &mut R) -> Self {
        let volume_descriptor = read_sector(iso, PVD_SECTOR).ok();
        let boot_record = read_sector(iso, BOOT_RECORD_SECTOR).ok();

        let volume_id = prefix(volume_descriptor.as_ref(), VOLUME_ID_LENGTH);
        let boot_record_id = prefix(boot_record.as_ref(), BOOT_RECORD_ID_LENGTH);

        let path_table_sector = volume_descriptor
            .as_ref()
            .and_then(|pvd| read_u32_le(pvd, PVD_PATH_TABLE_OFFSET))
            .unwrap_or(0);
        let boot_catalog_sector = boot_record
            .as_ref()
            .and_then(|brvd| read_u32_le(brvd, BOOT_CATALOG_POINTER_OFFSET));

        let boot_catalog = boot_catalog_sector.and_then(|sector| read_sector(iso, sector).ok());

        Self {
            volume_descriptor,
            volume_id,
            boot_record,
            boot_record_id,
            path_table_sector,
            boot_catalog_sector: boot_catalog_sector.unwrap_or(0),
            boot_catalog,
        }
    }

    /// Checks the structural invariants, in order, and reports the first violation.
    pub fn validate(&self) -> Result<()> {
        if !contains(&self.volume_id, ISO_ID) {
            return Err(IsoError::MetaData(
                "No ISO9660 identifier found in primary volume descriptor".to_string(),
            ));
        }
        if !contains(&self.boot_record_id, EL_TORITO_ID) {
            return Err(IsoError::MetaData(
                "ISO image is not El Torito bootable".to_string(),
            ));
        }
        if self.path_table_sector < MIN_PATH_TABLE_SECTOR {
            return Err(IsoError::MetaData(format!(
                "Invalid path table sector 0x{:x}",
                self.path_table_sector
            )));
        }
        if self.boot_catalog_sector < MIN_BOOT_CATALOG_SECTOR {
            return Err(IsoError::MetaData(format!(
                "Invalid boot catalog sector 0x{:x}",
                self.boot_catalog_sector
            )));
        }
        if self.boot_catalog.is_none() {
            return Err(IsoError::MetaData(format!(
                "Boot catalog at sector 0x{:x} could not be read",
                self.boot_catalog_sector
            )));
        }
        Ok(())
    }

    /// The boot record descriptor with its catalog pointer set to `sector`.
    pub fn boot_record_pointing_to(&self, sector: u32) -> Option<Sector> {
        let mut boot_record = self.boot_record?;
        boot_record[BOOT_CATALOG_POINTER_OFFSET..BOOT_CATALOG_POINTER_OFFSET + 4]
            .copy_from_slice(&sector.to_le_bytes());
        Some(boot_record)
    }
}

/// True if `needle` occurs anywhere in `haystack`.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

fn prefix(sector: Option<&Sector>, length: usize) -> Vec<u8> {
    sector
        .map(|data| data[..length.min(ISO_SECTOR_SIZE)].to_vec())
        .unwrap_or_default()
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
