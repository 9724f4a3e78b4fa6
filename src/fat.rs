// hybridiso/src/fat.rs
use crate::error::{IsoError, Result};
use crate::utils;
use fatfs::{FatType, FileSystem, FormatVolumeOptions, FsOptions};
use std::{
    fs::{self, OpenOptions},
    io::{self, Read, Seek, Write},
    path::Path,
};
use walkdir::WalkDir;

pub const EFI_FAT_VOLUME_LABEL: [u8; 11] = *b"BOOT       ";

const MIB: u64 = 1024 * 1024;

/// Creates the FAT image that the firmware boots from the EFI El Torito
/// entry, and copies the `EFI` directory tree `efi_tree` into its root.
///
/// The image is `size_mb` MiB large unless the tree needs more room.
/// Returns the image size in bytes.
pub fn create_embedded_fat_efi_image(efi_tree: &Path, target: &Path, size_mb: u64) -> Result<u64> {
    if !efi_tree.is_dir() {
        return Err(IsoError::Loader(format!(
            "EFI directory not found at {}",
            efi_tree.display()
        )));
    }

    // Add overhead and enforce a minimum size.
    const MIN_FAT_SIZE: u64 = 16 * MIB; // Ensures FAT16 formatting.
    const FAT_OVERHEAD: u64 = 2 * MIB;
    let content_size = tree_size(efi_tree)?;
    let mut total_size = (size_mb * MIB)
        .max(content_size + FAT_OVERHEAD)
        .max(MIN_FAT_SIZE);

    // Round up to the nearest sector size
    const SECTOR_SIZE: u64 = 512;
    total_size = total_size.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;

    let fat_type = if total_size <= 256 * MIB {
        FatType::Fat16
    } else {
        FatType::Fat32
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(target)?;
    file.set_len(total_size)?;
    file.flush()?;
    file.seek(io::SeekFrom::Start(0))?;

    fatfs::format_volume(
        &mut file,
        FormatVolumeOptions::new()
            .fat_type(fat_type)
            .volume_label(EFI_FAT_VOLUME_LABEL),
    )?;

    let fs = FileSystem::new(&mut file, FsOptions::new())?;
    {
        let efi_dir = fs.root_dir().create_dir("EFI")?;
        copy_tree_to_fat(&efi_dir, efi_tree)?;
    }
    fs.unmount()?;

    log::info!(
        "Created EFI FAT image {} ({} bytes)",
        target.display(),
        total_size
    );
    Ok(total_size)
}

/// Copies the directory tree `src` into `dir`. Symlinks are not followed.
fn copy_tree_to_fat<T: Read + Write + Seek>(dir: &fatfs::Dir<T>, src: &Path) -> Result<()> {
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let rel = fat_path(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            dir.create_dir(&rel)?;
        } else if file_type.is_file() {
            utils::copy_to_fat(dir, entry.path(), &rel)?;
        } else {
            log::warn!("Skipping {} in EFI tree, not a regular file", entry.path().display());
        }
    }
    Ok(())
}

fn fat_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn tree_size(path: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            size += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(size)
}
