// hybridiso/src/iso/relocation.rs
use crate::config::WriteMode;
use crate::error::{IsoError, Result};
use crate::iso::volume_descriptor::{BOOT_RECORD_SECTOR, ISO_ID, IsoMetadata, TERMINATOR_ID, contains};
use crate::utils::{SectorPatch, apply_sector_patches, read_sector};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// Sectors searched for free space when the catalog is not where expected.
pub const RELOCATION_SCAN_START: u32 = 0x12;
pub const RELOCATION_SCAN_END: u32 = 0x3F;

const DESCRIPTOR_ID_LENGTH: usize = 7;

/// Old and new location of a relocated boot catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub from: u32,
    pub to: u32,
}

/// Moves the boot catalog in front of the path table, where hybrid boot
/// tooling expects it, and updates the El Torito catalog pointer.
///
/// Returns `None` when the catalog is already in place or when the target
/// sector is not empty; the image is left untouched in both cases.
pub fn relocate_boot_catalog(isofile: &Path, mode: WriteMode) -> Result<Option<Relocation>> {
    let metadata = IsoMetadata::read_validated(isofile)?;

    let target = {
        let mut iso = File::open(isofile)?;
        match find_relocation_target(&mut iso, &metadata) {
            Some(target) if target != metadata.boot_catalog_sector => {
                match read_sector(&mut iso, target) {
                    Ok(data) if data.iter().all(|&b| b == 0) => target,
                    _ => {
                        log::debug!(
                            "Sector 0x{:x} is not empty, keeping boot catalog at 0x{:x}",
                            target,
                            metadata.boot_catalog_sector
                        );
                        return Ok(None);
                    }
                }
            }
            _ => {
                log::debug!(
                    "Boot catalog at sector 0x{:x} needs no relocation",
                    metadata.boot_catalog_sector
                );
                return Ok(None);
            }
        }
    };

    let (catalog, boot_record) = metadata
        .boot_catalog
        .zip(metadata.boot_record_pointing_to(target))
        .ok_or_else(|| IsoError::MetaData("Boot record or catalog could not be read".to_string()))?;
    apply_sector_patches(
        isofile,
        &[
            SectorPatch::new(target, catalog),
            SectorPatch::new(BOOT_RECORD_SECTOR, boot_record),
        ],
        mode,
    )?;

    log::debug!(
        "Relocated boot catalog from sector 0x{:x} to 0x{:x}",
        metadata.boot_catalog_sector,
        target
    );
    Ok(Some(Relocation {
        from: metadata.boot_catalog_sector,
        to: target,
    }))
}

/// Picks the sector the catalog belongs in.
///
/// That is the sector in front of the path table when a volume descriptor
/// precedes it. Otherwise it is the sector after a `TEA01` terminator, or the
/// current catalog sector if that comes first in the scan range.
pub fn find_relocation_target<R: Read + Seek>(iso: &mut R, metadata: &IsoMetadata) -> Option<u32> {
    let candidate = metadata.path_table_sector.checked_sub(1)?;
    if let Some(previous) = candidate.checked_sub(1)
        && has_descriptor_id(iso, previous, ISO_ID)
    {
        return Some(candidate);
    }

    (RELOCATION_SCAN_START..=RELOCATION_SCAN_END)
        .find(|&sector| {
            has_descriptor_id(iso, sector, TERMINATOR_ID) || sector + 1 == metadata.boot_catalog_sector
        })
        .map(|sector| sector + 1)
}

fn has_descriptor_id<R: Read + Seek>(iso: &mut R, sector: u32, id: &[u8]) -> bool {
    read_sector(iso, sector)
        .map(|data| contains(&data[..DESCRIPTOR_ID_LENGTH], id))
        .unwrap_or(false)
}
