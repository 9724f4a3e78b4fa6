// hybridiso/src/iso/header_end.rs
use crate::config::HeaderScanLimits;
use crate::error::{IsoError, Result};
use crate::iso::listing::IsoListingEntry;
use crate::utils::{ISO_SECTOR_SIZE, Sector, read_sector};
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

/// Content of the marker file, mastered last so it ends the first ISO block.
pub const HEADER_ID: &str = "7984fc91-a43f-4e45-bf27-6d3aa08b24cf";
pub const HEADER_END_NAME: &str = "header_end";

/// Position of the end of the first ISO block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HybridOffset {
    /// Sector index in 2048 byte sectors.
    pub offset_2k: u32,
}

impl HybridOffset {
    pub fn new(offset_2k: u32) -> Self {
        Self { offset_2k }
    }

    /// The same position in 512 byte sectors.
    pub fn offset_512(&self) -> u64 {
        self.offset_2k as u64 * 4
    }

    pub fn offset_bytes(&self) -> u64 {
        self.offset_2k as u64 * ISO_SECTOR_SIZE as u64
    }
}

/// Writes the marker file into the root of `source_dir`.
pub fn write_header_end_marker(source_dir: &Path) -> Result<PathBuf> {
    let marker = source_dir.join(HEADER_END_NAME);
    fs::write(&marker, format!("{HEADER_ID}\n"))?;
    Ok(marker)
}

/// Searches the sectors at and in front of the first listed files for the
/// marker and returns the matching sector with its index.
pub fn find_header_end<R: Read + Seek>(
    iso: &mut R,
    listing: &[IsoListingEntry],
    limits: &HeaderScanLimits,
) -> Result<(HybridOffset, Sector)> {
    let id = HEADER_ID.as_bytes();
    for entry in listing.iter().take(limits.attempts) {
        for back in 0..=limits.max_scan_back {
            let Some(sector) = entry.start.checked_sub(back) else {
                break;
            };
            let Ok(data) = read_sector(iso, sector) else {
                continue;
            };
            if data.starts_with(id) {
                log::debug!("Found header end marker at sector 0x{:x}", sector);
                return Ok((HybridOffset::new(sector), data));
            }
        }
    }
    Err(IsoError::Loader(format!(
        "Header end marker not found in the first {} files",
        limits.attempts
    )))
}

/// Locates the marker in the mastered image and stores its sector as the
/// header end artifact, which then takes the place of the marker file.
pub fn create_header_end_block(
    isofile: &Path,
    listing: &[IsoListingEntry],
    artifact: &Path,
    limits: &HeaderScanLimits,
) -> Result<HybridOffset> {
    let (offset, block) = {
        let mut iso = File::open(isofile)?;
        find_header_end(&mut iso, listing, limits)?
    };
    fs::write(artifact, block)?;
    Ok(offset)
}
