//! Post-processing of El Torito bootable ISO9660 images into hybrid images
//! that boot from optical media, legacy BIOS disks and UEFI disks alike.

pub mod builder;
pub mod command;
pub mod config;
pub mod error;
pub mod fat;
pub mod iso;
pub mod utils;

pub use builder::{create_efi_loader_image, create_hybrid_iso, create_iso_on_file};
pub use config::{HeaderScanLimits, IsoConfig, WriteMode};
pub use error::{IsoError, Result};
pub use iso::boot_catalog::fixup_boot_catalog;
pub use iso::header_end::{HybridOffset, create_header_end_block};
pub use iso::relocation::relocate_boot_catalog;
pub use iso::volume_descriptor::IsoMetadata;
