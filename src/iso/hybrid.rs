// hybridiso/src/iso/hybrid.rs
use crate::command::{find_tool, run_command};
use crate::config::IsoConfig;
use crate::error::{IsoError, Result};
use crate::iso::header_end::HybridOffset;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Linux partition type of the embedded MBR partition.
pub const HYBRID_PARTITION_TYPE: &str = "0x83";

/// isohybrid diagnostics that do not affect the result.
const HARMLESS_HYBRID_WARNINGS: &[&str] = &[
    "Warning: more than 1024 cylinders",
    "Not all BIOSes will be able to boot this device",
];

/// Embeds an MBR (and with `efi` a GPT) into the image so that it also
/// boots from a raw disk.
pub fn create_hybrid(
    offset: HybridOffset,
    mbr_id: &str,
    isofile: &Path,
    efi: bool,
    config: &IsoConfig,
) -> Result<()> {
    let tool = tool_path(&config.hybrid_tool, "isohybrid")?;
    let args = hybrid_arguments(offset, mbr_id, isofile, efi);
    let output = run_command(&tool, &args)?;

    let errors = unexpected_hybrid_errors(&output.stderr);
    if !errors.is_empty() {
        return Err(IsoError::Command {
            command: format!("{} {}", tool.display(), args.join(" ")),
            status: Some(0),
            stderr: errors.join("\n"),
        });
    }
    log::info!("Created hybrid image {}", isofile.display());
    Ok(())
}

/// Command line arguments for isohybrid.
pub fn hybrid_arguments(offset: HybridOffset, mbr_id: &str, isofile: &Path, efi: bool) -> Vec<String> {
    let mut args = vec![
        "--offset".to_string(),
        offset.offset_2k.to_string(),
        "--id".to_string(),
        mbr_id.to_string(),
        "--type".to_string(),
        HYBRID_PARTITION_TYPE.to_string(),
    ];
    if efi {
        args.push("--uefi".to_string());
    }
    args.push(isofile.display().to_string());
    args
}

/// Lines of isohybrid's stderr that are real errors.
pub fn unexpected_hybrid_errors(stderr: &str) -> Vec<&str> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !HARMLESS_HYBRID_WARNINGS.iter().any(|warning| line.contains(warning)))
        .collect()
}

/// A random disk signature for the hybrid MBR, formatted as `0x%08x`.
pub fn generate_mbr_id() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("0x{id:08x}")
}

/// Stores an MD5 checksum of the image in its application area.
pub fn set_media_tag(isofile: &Path, config: &IsoConfig) -> Result<()> {
    let tool = tool_path(&config.tagmedia_tool, "tagmedia")?;
    let args = [
        OsStr::new("--md5"),
        OsStr::new("--check"),
        OsStr::new("--pad"),
        OsStr::new("150"),
        isofile.as_os_str(),
    ];
    run_command(&tool, &args)?;
    Ok(())
}

fn tool_path(configured: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
    match configured {
        Some(tool) => Ok(tool.clone()),
        None => find_tool(&[name]).ok_or_else(|| IsoError::Tool(format!("{name} not found"))),
    }
}
