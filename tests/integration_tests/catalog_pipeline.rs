use std::{fs, io};

use hybridiso::{
    IsoError, IsoMetadata, WriteMode, fixup_boot_catalog, iso::relocation::Relocation,
    relocate_boot_catalog,
};
use tempfile::tempdir;

use crate::integration_tests::common::{RawIso, init_logger, read_iso_sector};

#[test]
fn test_pvd_without_boot_record_is_rejected() -> io::Result<()> {
    init_logger();
    let temp_dir = tempdir()?;
    let iso_path = temp_dir.path().join("plain.iso");
    // 10 MiB of zeros tagged with a primary volume descriptor only.
    RawIso::new(5 * 1024).primary_descriptor(0x15).write_to(&iso_path)?;
    let before = fs::read(&iso_path)?;

    assert!(matches!(
        IsoMetadata::read_validated(&iso_path),
        Err(IsoError::MetaData(_))
    ));
    assert!(matches!(
        fixup_boot_catalog(&iso_path, WriteMode::Staged),
        Err(IsoError::MetaData(_))
    ));
    assert!(matches!(
        relocate_boot_catalog(&iso_path, WriteMode::Staged),
        Err(IsoError::MetaData(_))
    ));
    assert_eq!(before, fs::read(&iso_path)?);
    Ok(())
}

#[test]
fn test_fixup_of_catalog_at_sector_0x50() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let temp_dir = tempdir()?;
    let iso_path = temp_dir.path().join("catalog.iso");
    RawIso::new(0x60)
        .primary_descriptor(0x51)
        .boot_record(0x50)
        .catalog(0x50, false)
        .write_to(&iso_path)?;
    let before = fs::read(&iso_path)?;

    // The catalog already sits in front of the path table.
    assert_eq!(relocate_boot_catalog(&iso_path, WriteMode::Staged)?, None);
    assert_eq!(before, fs::read(&iso_path)?);

    fixup_boot_catalog(&iso_path, WriteMode::Staged)?;
    let catalog = read_iso_sector(&iso_path, 0x50)?;
    let legacy = &catalog[32..64];
    assert_eq!(legacy[12], 1);
    assert_eq!(&legacy[13..32], b"Legacy (isolinux)\0\0");

    // The EFI entry moved behind a final EFI section header.
    assert_eq!(&catalog[64..68], &[0x91, 0xEF, 0x01, 0x00]);
    assert_eq!(catalog[96], 0x88);
    assert_eq!(&catalog[108..120], b"\x01UEFI (grub)");
    Ok(())
}

#[test]
fn test_relocate_then_fixup() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let temp_dir = tempdir()?;

    for mode in [WriteMode::Staged, WriteMode::InPlace] {
        let iso_path = temp_dir.path().join(format!("{mode:?}.iso"));
        RawIso::new(0x40)
            .primary_descriptor(0x30)
            .boot_record(0x20)
            .terminator(0x12)
            .catalog(0x20, true)
            .write_to(&iso_path)?;
        let original_catalog = read_iso_sector(&iso_path, 0x20)?;

        let relocation = relocate_boot_catalog(&iso_path, mode)?;
        assert_eq!(relocation, Some(Relocation { from: 0x20, to: 0x13 }));
        assert_eq!(read_iso_sector(&iso_path, 0x13)?, original_catalog);

        fixup_boot_catalog(&iso_path, mode)?;
        let metadata = IsoMetadata::read_validated(&iso_path)?;
        assert_eq!(metadata.boot_catalog_sector, 0x13);
        let catalog = metadata.boot_catalog.unwrap();
        assert_eq!(catalog[32], 0x88);
        assert_eq!(&catalog[45..62], b"Legacy (isolinux)");

        // Both steps are no-ops the second time round.
        let done = fs::read(&iso_path)?;
        assert_eq!(relocate_boot_catalog(&iso_path, mode)?, None);
        fixup_boot_catalog(&iso_path, mode)?;
        assert_eq!(done, fs::read(&iso_path)?);
    }
    Ok(())
}
