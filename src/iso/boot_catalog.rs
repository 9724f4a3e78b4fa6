// hybridiso/src/iso/boot_catalog.rs
use crate::config::WriteMode;
use crate::error::{IsoError, Result};
use crate::iso::volume_descriptor::IsoMetadata;
use crate::utils::{Sector, SectorPatch, apply_sector_patches};
use std::path::Path;

/// Boot catalog constants
pub const BOOT_CATALOG_ENTRY_SIZE: usize = 32;
pub const BOOT_CATALOG_HEADER_SIGNATURE: u16 = 0xAA55;
pub const BOOT_CATALOG_VALIDATION_ENTRY_HEADER_ID: u8 = 1;
pub const BOOT_CATALOG_BOOT_ENTRY_HEADER_ID: u8 = 0x88;
pub const BOOT_CATALOG_SECTION_HEADER_ID: u8 = 0x90;
pub const BOOT_CATALOG_LAST_SECTION_HEADER_ID: u8 = 0x91;
pub const BOOT_CATALOG_EFI_PLATFORM_ID: u8 = 0xEF;
pub const BOOT_CATALOG_CHECKSUM_OFFSET: usize = 28;

/// Selection criteria of a boot entry: one type byte followed by 19 bytes of data.
pub const SELECTION_CRITERIA_OFFSET: usize = 12;
pub const SELECTION_CRITERIA_LANGUAGE_AND_VERSION: u8 = 1;
pub const LOADER_ID_LENGTH: usize = 19;

pub const LEGACY_LOADER_ID: &str = "Legacy (isolinux)";
pub const UEFI_LOADER_ID: &str = "UEFI (grub)";

const LEGACY_SLOT: usize = 1;
const EFI_SLOT: usize = 2;
const MOVED_EFI_SLOT: usize = 3;

pub type RawEntry = [u8; BOOT_CATALOG_ENTRY_SIZE];

/// Sums the 16 little endian words of a validation entry. Valid entries sum to 0.
pub fn validation_checksum(entry: &RawEntry) -> u16 {
    entry
        .chunks_exact(2)
        .fold(0u16, |sum, word| sum.wrapping_add(u16::from_le_bytes([word[0], word[1]])))
}

/// An initial/default or section boot entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootEntry(pub RawEntry);

impl BootEntry {
    pub fn is_bootable(&self) -> bool {
        self.0[0] == BOOT_CATALOG_BOOT_ENTRY_HEADER_ID
    }

    /// The loader identifier stored in the selection criteria, if any.
    pub fn loader_id(&self) -> Option<String> {
        if self.0[SELECTION_CRITERIA_OFFSET] != SELECTION_CRITERIA_LANGUAGE_AND_VERSION {
            return None;
        }
        let field = &self.0[SELECTION_CRITERIA_OFFSET + 1..];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Some(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    /// Returns the entry with `id` written as its selection criteria.
    pub fn with_loader_id(mut self, id: &str) -> Self {
        let mut field = [0u8; LOADER_ID_LENGTH];
        let len = id.len().min(LOADER_ID_LENGTH);
        field[..len].copy_from_slice(&id.as_bytes()[..len]);
        self.0[SELECTION_CRITERIA_OFFSET] = SELECTION_CRITERIA_LANGUAGE_AND_VERSION;
        self.0[SELECTION_CRITERIA_OFFSET + 1..].copy_from_slice(&field);
        self
    }
}

/// A decoded 32 byte boot catalog record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogEntry {
    Validation(RawEntry),
    /// The initial/default entry, booted by legacy BIOS.
    Legacy(BootEntry),
    Section(BootEntry),
    SectionHeader {
        last: bool,
        platform_id: u8,
        entry_count: u16,
        id: [u8; 28],
    },
    Other(RawEntry),
}

impl CatalogEntry {
    /// Decodes the record stored in catalog slot `slot`.
    pub fn decode(slot: usize, raw: &RawEntry) -> Self {
        match slot {
            0 => CatalogEntry::Validation(*raw),
            LEGACY_SLOT => CatalogEntry::Legacy(BootEntry(*raw)),
            _ => match raw[0] {
                BOOT_CATALOG_SECTION_HEADER_ID | BOOT_CATALOG_LAST_SECTION_HEADER_ID => {
                    let mut id = [0u8; 28];
                    id.copy_from_slice(&raw[4..]);
                    CatalogEntry::SectionHeader {
                        last: raw[0] == BOOT_CATALOG_LAST_SECTION_HEADER_ID,
                        platform_id: raw[1],
                        entry_count: u16::from_le_bytes([raw[2], raw[3]]),
                        id,
                    }
                }
                BOOT_CATALOG_BOOT_ENTRY_HEADER_ID => CatalogEntry::Section(BootEntry(*raw)),
                _ => CatalogEntry::Other(*raw),
            },
        }
    }

    pub fn encode(&self) -> RawEntry {
        match self {
            CatalogEntry::Validation(raw) | CatalogEntry::Other(raw) => *raw,
            CatalogEntry::Legacy(entry) | CatalogEntry::Section(entry) => entry.0,
            CatalogEntry::SectionHeader {
                last,
                platform_id,
                entry_count,
                id,
            } => {
                let mut raw = [0u8; BOOT_CATALOG_ENTRY_SIZE];
                raw[0] = if *last {
                    BOOT_CATALOG_LAST_SECTION_HEADER_ID
                } else {
                    BOOT_CATALOG_SECTION_HEADER_ID
                };
                raw[1] = *platform_id;
                raw[2..4].copy_from_slice(&entry_count.to_le_bytes());
                raw[4..].copy_from_slice(id);
                raw
            }
        }
    }

    /// Final section header announcing one EFI entry.
    pub fn efi_section_header() -> Self {
        CatalogEntry::SectionHeader {
            last: true,
            platform_id: BOOT_CATALOG_EFI_PLATFORM_ID,
            entry_count: 1,
            id: [0u8; 28],
        }
    }
}

/// The boot catalog sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootCatalog {
    sector: Sector,
}

impl BootCatalog {
    pub fn new(sector: Sector) -> Self {
        Self { sector }
    }

    pub fn as_sector(&self) -> &Sector {
        &self.sector
    }

    pub fn raw_entry(&self, slot: usize) -> RawEntry {
        let start = slot * BOOT_CATALOG_ENTRY_SIZE;
        let mut raw = [0u8; BOOT_CATALOG_ENTRY_SIZE];
        raw.copy_from_slice(&self.sector[start..start + BOOT_CATALOG_ENTRY_SIZE]);
        raw
    }

    pub fn entry(&self, slot: usize) -> CatalogEntry {
        CatalogEntry::decode(slot, &self.raw_entry(slot))
    }

    pub fn set_entry(&mut self, slot: usize, entry: &CatalogEntry) {
        let start = slot * BOOT_CATALOG_ENTRY_SIZE;
        self.sector[start..start + BOOT_CATALOG_ENTRY_SIZE].copy_from_slice(&entry.encode());
    }

    pub fn has_valid_validation_entry(&self) -> bool {
        let validation = self.raw_entry(0);
        validation[0] == BOOT_CATALOG_VALIDATION_ENTRY_HEADER_ID
            && validation[30..32] == BOOT_CATALOG_HEADER_SIGNATURE.to_le_bytes()
            && validation_checksum(&validation) == 0
    }

    /// Labels the legacy and the EFI entry with their loader names.
    ///
    /// An EFI entry that directly follows the default entry is moved one slot
    /// down behind a new final EFI section header. Applying this twice gives
    /// the same catalog as applying it once.
    pub fn fixup(&mut self) {
        let legacy = BootEntry(self.raw_entry(LEGACY_SLOT)).with_loader_id(LEGACY_LOADER_ID);
        self.set_entry(LEGACY_SLOT, &CatalogEntry::Legacy(legacy));

        match self.entry(EFI_SLOT) {
            CatalogEntry::Section(efi) => {
                self.set_entry(EFI_SLOT, &CatalogEntry::efi_section_header());
                self.set_entry(
                    MOVED_EFI_SLOT,
                    &CatalogEntry::Section(efi.with_loader_id(UEFI_LOADER_ID)),
                );
            }
            CatalogEntry::SectionHeader { .. } => {
                let efi = BootEntry(self.raw_entry(MOVED_EFI_SLOT)).with_loader_id(UEFI_LOADER_ID);
                self.set_entry(MOVED_EFI_SLOT, &CatalogEntry::Other(efi.0));
            }
            other => {
                let efi = BootEntry(other.encode()).with_loader_id(UEFI_LOADER_ID);
                self.set_entry(EFI_SLOT, &CatalogEntry::Other(efi.0));
            }
        }
    }
}

/// Rewrites the boot catalog of the image so that both the legacy and the
/// EFI loader entry are labelled and the EFI entry sits in its own section.
pub fn fixup_boot_catalog(isofile: &Path, mode: WriteMode) -> Result<()> {
    let metadata = IsoMetadata::read_validated(isofile)?;
    let original = metadata.boot_catalog.ok_or_else(|| {
        IsoError::MetaData("Boot catalog could not be read".to_string())
    })?;

    let mut catalog = BootCatalog::new(original);
    if !catalog.has_valid_validation_entry() {
        log::warn!(
            "Boot catalog at sector 0x{:x} has an invalid validation entry",
            metadata.boot_catalog_sector
        );
    }
    catalog.fixup();

    if catalog.as_sector() == &original {
        log::debug!("Boot catalog is already fixed up");
        return Ok(());
    }
    apply_sector_patches(
        isofile,
        &[SectorPatch::new(metadata.boot_catalog_sector, *catalog.as_sector())],
        mode,
    )?;
    log::debug!(
        "Fixed up boot catalog at sector 0x{:x}",
        metadata.boot_catalog_sector
    );
    Ok(())
}
