use std::{fs, io};

use hybridiso::{
    IsoConfig, IsoError, IsoMetadata,
    iso::header_end::{HEADER_END_NAME, HEADER_ID},
    iso::parameters::{IsoParameterBuilder, read_sortfile},
};
use tempfile::tempdir;

use crate::integration_tests::common::{
    cdrtools_available, create_source_tree, init_logger, read_iso_sector,
};

#[test]
fn test_parameters_for_source_tree() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let temp_dir = tempdir()?;
    let source = temp_dir.path().join("source");
    create_source_tree(&source, "x86_64")?;
    let config = IsoConfig::for_arch("x86_64");
    hybridiso::create_efi_loader_image(&source, &source.join("EFI"), &config)?;

    let mut builder = IsoParameterBuilder::new(&source, &config);
    builder.init_iso_creation_parameters(&["-V".to_string(), "LIVE".to_string()])?;
    builder.add_efi_loader_parameters()?;

    let params: Vec<String> = builder
        .get_iso_creation_parameters()
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    assert_eq!(&params[..2], &["-V", "LIVE"]);
    assert!(params.windows(2).any(|w| w == ["-b", "boot/x86_64/loader/isolinux.bin"]));
    assert!(params.windows(2).any(|w| w == ["-b", "boot/x86_64/efi"]));
    // 20 MiB in 512 byte blocks.
    assert_eq!(params.last().map(String::as_str), Some("40960"));

    let sortfile = read_sortfile(builder.sortfile_path().unwrap())?;
    let header_end = sortfile
        .iter()
        .find(|(path, _)| path.ends_with(HEADER_END_NAME))
        .unwrap();
    assert_eq!(header_end.1, 1_000_000);
    Ok(())
}

#[test]
fn test_missing_loader_leaves_tree_untouched() -> io::Result<()> {
    init_logger();
    let temp_dir = tempdir()?;
    fs::create_dir_all(temp_dir.path().join("boot/x86_64"))?;
    let config = IsoConfig::for_arch("x86_64");

    let result = hybridiso::create_iso_on_file(
        temp_dir.path(),
        &temp_dir.path().join("out.iso"),
        &[],
        &config,
    );
    assert!(matches!(result, Err(IsoError::Loader(_))));
    assert!(!temp_dir.path().join(HEADER_END_NAME).exists());
    assert!(!temp_dir.path().join("out.iso").exists());
    Ok(())
}

#[test]
fn test_create_iso_on_file() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    if !cdrtools_available() {
        eprintln!("mkisofs/genisoimage or isoinfo not installed, skipping");
        return Ok(());
    }
    let temp_dir = tempdir()?;
    let source = temp_dir.path().join("source");
    create_source_tree(&source, "x86_64")?;
    let iso_path = temp_dir.path().join("live.iso");
    let config = IsoConfig::for_arch("x86_64");

    let offset = hybridiso::create_iso_on_file(&source, &iso_path, &[], &config)?;
    assert!(offset.offset_2k > 0x11);
    assert_eq!(offset.offset_512(), 4 * offset.offset_2k as u64);

    // The header end artifact is the marker sector of the first pass.
    let artifact = fs::read(source.join(HEADER_END_NAME))?;
    assert_eq!(artifact.len(), 2048);
    assert!(artifact.starts_with(HEADER_ID.as_bytes()));

    let metadata = IsoMetadata::read_validated(&iso_path)?;
    let catalog = read_iso_sector(&iso_path, metadata.boot_catalog_sector)?;
    assert_eq!(catalog[44], 1);
    assert_eq!(&catalog[45..62], b"Legacy (isolinux)");
    Ok(())
}
