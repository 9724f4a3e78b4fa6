// hybridiso/src/iso/parameters.rs
use crate::command::{find_tool, run_command};
use crate::config::IsoConfig;
use crate::error::{IsoError, Result};
use crate::iso::header_end::{HEADER_END_NAME, write_header_end_marker};
use std::ffi::OsString;
use std::cmp::Ordering;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{self, Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::{DirEntry, WalkDir};

pub const MASTERING_TOOLS: &[&str] = &["mkisofs", "genisoimage"];

pub const EFI_LOADER_NAME: &str = "efi";

/// Sort file weights. Higher weights are placed earlier in the image.
pub const CATALOG_PRIORITY: u32 = 3;
pub const LOADER_PRIORITY: u32 = 2;
pub const EFI_LOADER_PRIORITY: u32 = 1_000_001;
pub const HEADER_END_PRIORITY: u32 = 1_000_000;
pub const DEFAULT_PRIORITY: u32 = 1;

/// El Torito boot load size is a 16 bit count of 512 byte blocks.
const MAX_BOOT_LOAD_SIZE: u64 = 0xffff;

/// Collects the mastering tool parameters for a bootable hybrid ISO.
#[derive(Debug)]
pub struct IsoParameterBuilder {
    source_dir: PathBuf,
    boot_path: String,
    mastering_tool: Option<PathBuf>,
    sortfile: Option<NamedTempFile>,
    iso_parameters: Vec<OsString>,
    iso_loaders: Vec<OsString>,
}

impl IsoParameterBuilder {
    /// The source tree is made absolute once. The sort file entries and the
    /// mastering tool argument are both derived from that path.
    pub fn new(source_dir: &Path, config: &IsoConfig) -> Self {
        Self {
            source_dir: path::absolute(source_dir).unwrap_or_else(|_| source_dir.to_path_buf()),
            boot_path: config.boot_path(),
            mastering_tool: config.mastering_tool.clone(),
            sortfile: None,
            iso_parameters: Vec::new(),
            iso_loaders: Vec::new(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Legacy loader, relative to the source tree.
    pub fn loader_file(&self) -> String {
        format!("{}/loader/isolinux.bin", self.boot_path)
    }

    pub fn catalog_file(&self) -> String {
        format!("{}/boot.catalog", self.boot_path)
    }

    pub fn efi_loader_file(&self) -> String {
        format!("{}/{}", self.boot_path, EFI_LOADER_NAME)
    }

    /// Sets up the base and loader parameters.
    ///
    /// Fails without touching the source tree if the legacy loader is
    /// missing. Otherwise the header end marker and the sort file are written.
    pub fn init_iso_creation_parameters(&mut self, custom_args: &[String]) -> Result<()> {
        let loader_file = self.loader_file();
        if !self.source_dir.join(&loader_file).is_file() {
            return Err(IsoError::Loader(format!(
                "No isolinux loader found in {}",
                self.source_dir.join(&self.boot_path).join("loader").display()
            )));
        }
        write_header_end_marker(&self.source_dir)?;

        let mut sortfile = NamedTempFile::new()?;
        {
            let mut out = BufWriter::new(sortfile.as_file_mut());
            create_sortfile(&mut out, &self.source_dir, &self.boot_path)?;
            out.flush()?;
        }

        let catalog_file = self.catalog_file();
        self.iso_parameters = custom_args.iter().map(OsString::from).collect();
        self.iso_parameters.extend(
            ["-R", "-J", "-f", "-pad", "-joliet-long", "-sort"]
                .into_iter()
                .map(OsString::from),
        );
        self.iso_parameters.push(sortfile.path().as_os_str().to_owned());
        self.iso_parameters.extend(
            [
                "-no-emul-boot",
                "-boot-load-size",
                "4",
                "-boot-info-table",
                "-hide",
                catalog_file.as_str(),
                "-hide-joliet",
                catalog_file.as_str(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        self.iso_loaders = ["-b", loader_file.as_str(), "-c", catalog_file.as_str()]
            .into_iter()
            .map(OsString::from)
            .collect();
        self.sortfile = Some(sortfile);
        Ok(())
    }

    /// Adds the EFI loader as alternative boot entry if the source tree has one.
    pub fn add_efi_loader_parameters(&mut self) -> Result<()> {
        let loader_file = self.efi_loader_file();
        let loader_path = self.source_dir.join(&loader_file);
        if !loader_path.exists() {
            log::debug!("No EFI loader at {}, skipping alternative boot entry", loader_path.display());
            return Ok(());
        }
        self.iso_loaders.extend(
            ["-eltorito-alt-boot", "-b", loader_file.as_str(), "-no-emul-boot", "-joliet-long"]
                .into_iter()
                .map(OsString::from),
        );
        let metadata = fs::metadata(&loader_path)?;
        if metadata.is_file() {
            let blocks = metadata.len() / 512;
            if blocks <= MAX_BOOT_LOAD_SIZE {
                self.iso_loaders.push("-boot-load-size".into());
                self.iso_loaders.push(blocks.to_string().into());
            }
        }
        Ok(())
    }

    /// Base parameters followed by the loader parameters.
    pub fn get_iso_creation_parameters(&self) -> Vec<OsString> {
        self.iso_parameters
            .iter()
            .chain(self.iso_loaders.iter())
            .cloned()
            .collect()
    }

    pub fn sortfile_path(&self) -> Option<&Path> {
        self.sortfile.as_ref().map(|f| f.path())
    }

    /// Runs the mastering tool. `hidden_files` are hidden from both the
    /// ISO9660 and the Joliet directory tree.
    pub fn create_iso(&self, filename: &Path, hidden_files: &[&str]) -> Result<()> {
        let tool = self.mastering_tool()?;
        run_command(&tool, &self.create_iso_arguments(filename, hidden_files))?;
        Ok(())
    }

    fn create_iso_arguments(&self, filename: &Path, hidden_files: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for &hidden in hidden_files {
            args.extend(["-hide", hidden, "-hide-joliet", hidden].into_iter().map(OsString::from));
        }
        args.extend(self.get_iso_creation_parameters());
        args.push("-o".into());
        args.push(filename.as_os_str().to_owned());
        args.push(self.source_dir.as_os_str().to_owned());
        args
    }

    fn mastering_tool(&self) -> Result<PathBuf> {
        match &self.mastering_tool {
            Some(tool) => Ok(tool.clone()),
            None => find_tool(MASTERING_TOOLS).ok_or_else(|| {
                IsoError::Tool(format!(
                    "No iso creation tool found, searched for: {MASTERING_TOOLS:?}"
                ))
            }),
        }
    }
}

/// Sort weight of a source tree entry, by its file name.
pub fn sort_priority(name: &str) -> u32 {
    match name {
        EFI_LOADER_NAME => EFI_LOADER_PRIORITY,
        HEADER_END_NAME => HEADER_END_PRIORITY,
        _ => DEFAULT_PRIORITY,
    }
}

/// Writes the sort file for `source_dir`, one `path priority` pair per line.
///
/// The boot catalog and the legacy loader are listed first. The rest of the
/// tree follows depth first, files before subdirectories. Paths are made
/// absolute but symlinks are kept, so they match what the mastering tool sees.
pub fn create_sortfile<W: Write>(out: &mut W, source_dir: &Path, boot_path: &str) -> Result<()> {
    let source_dir = path::absolute(source_dir)?;
    let catalog = source_dir.join(boot_path).join("boot.catalog");
    let loader = source_dir.join(boot_path).join("loader").join("isolinux.bin");
    writeln!(out, "{} {}", catalog.display(), CATALOG_PRIORITY)?;
    writeln!(out, "{} {}", loader.display(), LOADER_PRIORITY)?;
    write_sort_entries(out, &source_dir, &[catalog.as_path(), loader.as_path()])
}

fn write_sort_entries<W: Write>(out: &mut W, root: &Path, pinned: &[&Path]) -> Result<()> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by(files_first);
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if pinned.contains(&entry.path()) {
            continue;
        }
        let priority = sort_priority(&entry.file_name().to_string_lossy());
        writeln!(out, "{} {}", entry.path().display(), priority)?;
    }
    Ok(())
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Reads back a sort file, for inspection and tests.
pub fn read_sortfile(path: &Path) -> Result<Vec<(PathBuf, u32)>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> Result<(PathBuf, u32)> {
            let malformed = || {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Malformed sort file line: {line}"),
                )
            };
            let (path, priority) = line.rsplit_once(' ').ok_or_else(malformed)?;
            let priority: u32 = priority.parse().map_err(|_| malformed())?;
            Ok((PathBuf::from(path), priority))
        })
        .collect()
}
