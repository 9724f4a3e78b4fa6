// hybridiso/src/builder.rs
use crate::config::IsoConfig;
use crate::error::Result;
use crate::fat;
use crate::iso::boot_catalog::fixup_boot_catalog;
use crate::iso::header_end::{HEADER_END_NAME, HybridOffset, create_header_end_block};
use crate::iso::hybrid::{create_hybrid, generate_mbr_id};
use crate::iso::listing::list_iso;
use crate::iso::parameters::IsoParameterBuilder;
use crate::iso::relocation::relocate_boot_catalog;
use std::path::{Path, PathBuf};

/// Packs the `EFI` directory tree into the FAT image the EFI El Torito
/// entry boots from, at `<source_dir>/boot/<arch>/efi`.
pub fn create_efi_loader_image(source_dir: &Path, efi_tree: &Path, config: &IsoConfig) -> Result<PathBuf> {
    let target = source_dir.join(config.boot_path()).join("efi");
    fat::create_embedded_fat_efi_image(efi_tree, &target, config.efi_fat_image_size_mb)?;
    Ok(target)
}

/// Masters `source_dir` into `isofile` and prepares the result for hybrid
/// booting.
///
/// The image is mastered twice. The first pass only serves to find where the
/// header end marker lands; the second one hides the marker. Afterwards the
/// boot catalog is moved in front of the path table and its entries are
/// labelled. Returns the offset the hybrid MBR tool needs.
pub fn create_iso_on_file(
    source_dir: &Path,
    isofile: &Path,
    custom_args: &[String],
    config: &IsoConfig,
) -> Result<HybridOffset> {
    log::info!(
        "Creating ISO image {} from {}",
        isofile.display(),
        source_dir.display()
    );
    let mut parameters = IsoParameterBuilder::new(source_dir, config);
    parameters.init_iso_creation_parameters(custom_args)?;
    parameters.add_efi_loader_parameters()?;

    parameters.create_iso(isofile, &[])?;
    let listing = list_iso(isofile, config)?;
    let offset = create_header_end_block(
        isofile,
        &listing,
        &source_dir.join(HEADER_END_NAME),
        &config.header_scan,
    )?;

    parameters.create_iso(isofile, &[HEADER_END_NAME])?;
    if let Some(relocation) = relocate_boot_catalog(isofile, config.write_mode)? {
        log::info!(
            "Boot catalog moved from sector {} to {}",
            relocation.from,
            relocation.to
        );
    }
    fixup_boot_catalog(isofile, config.write_mode)?;

    log::info!(
        "ISO image {} created, first block ends at sector {}",
        isofile.display(),
        offset.offset_2k
    );
    Ok(offset)
}

/// Like [`create_iso_on_file`], and also embeds the hybrid MBR so that the
/// image boots from a USB stick. A GPT is added when the source tree has an
/// EFI loader.
pub fn create_hybrid_iso(
    source_dir: &Path,
    isofile: &Path,
    custom_args: &[String],
    config: &IsoConfig,
) -> Result<HybridOffset> {
    let offset = create_iso_on_file(source_dir, isofile, custom_args, config)?;
    let efi = source_dir.join(config.boot_path()).join("efi").exists();
    create_hybrid(offset, &generate_mbr_id(), isofile, efi, config)?;
    Ok(offset)
}
