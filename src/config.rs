// hybridiso/src/config.rs
use std::path::PathBuf;

/// How multi-sector patches are committed to an image file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Patch a copy of the image next to the original, then rename it over
    /// the original so an interrupted patch leaves the old image intact.
    #[default]
    Staged,
    /// Patch the image file directly.
    InPlace,
}

/// Bounds of the header end marker search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderScanLimits {
    /// Number of listed files, lowest start sector first, that are searched.
    pub attempts: usize,
    /// How many sectors before each file start are searched as well.
    pub max_scan_back: u32,
}

impl Default for HeaderScanLimits {
    fn default() -> Self {
        // Compatible with the fixed bound used by the existing tooling.
        Self {
            attempts: 8,
            max_scan_back: 8,
        }
    }
}

/// Configuration shared by the mastering and post-processing steps.
#[derive(Clone, Debug)]
pub struct IsoConfig {
    pub arch: String,
    pub mastering_tool: Option<PathBuf>,
    pub listing_tool: Option<PathBuf>,
    pub hybrid_tool: Option<PathBuf>,
    pub tagmedia_tool: Option<PathBuf>,
    pub write_mode: WriteMode,
    pub header_scan: HeaderScanLimits,
    /// Size of the embedded EFI FAT image in MiB.
    pub efi_fat_image_size_mb: u64,
}

impl Default for IsoConfig {
    fn default() -> Self {
        Self {
            arch: host_arch(),
            mastering_tool: None,
            listing_tool: None,
            hybrid_tool: None,
            tagmedia_tool: None,
            write_mode: WriteMode::default(),
            header_scan: HeaderScanLimits::default(),
            efi_fat_image_size_mb: 20,
        }
    }
}

impl IsoConfig {
    /// Creates a configuration for the given architecture name.
    pub fn for_arch(arch: &str) -> Self {
        Self {
            arch: normalize_arch(arch),
            ..Self::default()
        }
    }

    /// Architecture specific boot directory, relative to the source tree.
    pub fn boot_path(&self) -> String {
        format!("boot/{}", self.arch)
    }
}

fn host_arch() -> String {
    normalize_arch(std::env::consts::ARCH)
}

fn normalize_arch(arch: &str) -> String {
    match arch {
        "x86" | "i386" | "i586" | "i686" => "ix86".to_string(),
        other => other.to_string(),
    }
}
