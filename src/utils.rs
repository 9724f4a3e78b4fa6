// hybridiso/src/utils.rs

pub const ISO_SECTOR_SIZE: usize = 2048;

use crate::config::WriteMode;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// One raw ISO sector.
pub type Sector = [u8; ISO_SECTOR_SIZE];

/// Byte position of the given sector.
pub fn sector_offset(sector: u32) -> u64 {
    sector as u64 * ISO_SECTOR_SIZE as u64
}

/// Seeks the stream to the start of the given sector.
pub fn seek_to_lba<S: Seek>(stream: &mut S, lba: u32) -> io::Result<()> {
    stream.seek(SeekFrom::Start(sector_offset(lba)))?;
    Ok(())
}

/// Reads one full sector. Fails if the image ends before the sector does.
pub fn read_sector<R: Read + Seek>(reader: &mut R, sector: u32) -> io::Result<Sector> {
    seek_to_lba(reader, sector)?;
    let mut data = [0u8; ISO_SECTOR_SIZE];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Writes one full sector. `data` must be exactly one sector long.
pub fn write_sector<W: Write + Seek>(writer: &mut W, sector: u32, data: &[u8]) -> io::Result<()> {
    if data.len() != ISO_SECTOR_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Sector data must be {} bytes, got {}",
                ISO_SECTOR_SIZE,
                data.len()
            ),
        ));
    }
    seek_to_lba(writer, sector)?;
    writer.write_all(data)
}

/// A replacement for the content of one sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorPatch {
    pub sector: u32,
    pub data: Sector,
}

impl SectorPatch {
    pub fn new(sector: u32, data: Sector) -> Self {
        Self { sector, data }
    }
}

/// Applies all patches to the image at `path` as one unit.
///
/// With [`WriteMode::Staged`] the patches land in a copy of the image which
/// then replaces the original through a rename, so a crash never leaves a
/// half written catalog behind. [`WriteMode::InPlace`] writes directly.
pub fn apply_sector_patches(path: &Path, patches: &[SectorPatch], mode: WriteMode) -> io::Result<()> {
    if patches.is_empty() {
        return Ok(());
    }
    match mode {
        WriteMode::InPlace => {
            let mut image = OpenOptions::new().read(true).write(true).open(path)?;
            write_patches(&mut image, patches)?;
            image.sync_all()
        }
        WriteMode::Staged => {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let mut staged = NamedTempFile::new_in(parent)?;
            {
                let mut original = File::open(path)?;
                io::copy(&mut original, staged.as_file_mut())?;
            }
            write_patches(staged.as_file_mut(), patches)?;
            staged.as_file().sync_all()?;
            fs::set_permissions(staged.path(), fs::metadata(path)?.permissions())?;
            staged.persist(path).map_err(|e| e.error)?;
            Ok(())
        }
    }
}

fn write_patches(image: &mut File, patches: &[SectorPatch]) -> io::Result<()> {
    for patch in patches {
        write_sector(image, patch.sector, &patch.data)?;
    }
    image.flush()
}

/// Copies a file from the host filesystem into a FAT directory.
pub fn copy_to_fat<T: Read + Write + Seek>(
    dir: &fatfs::Dir<T>,
    src_path: &Path,
    dest: &str,
) -> io::Result<()> {
    let mut src_file = File::open(src_path)?;
    let mut f = dir.create_file(dest)?;
    io::copy(&mut src_file, &mut f)?;
    f.flush()?;
    log::debug!("Copied {} to {} in FAT image", src_path.display(), dest);
    Ok(())
}
