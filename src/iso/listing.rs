// hybridiso/src/iso/listing.rs
use crate::command::{find_tool, run_command};
use crate::config::IsoConfig;
use crate::error::{IsoError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const LISTING_TOOLS: &[&str] = &["/usr/bin/isoinfo", "/usr/lib/genisoimage/isoinfo"];

/// `<mode> <links> <uid> <gid> <size> <date> [ <start sector> <xattr length>] <name>`
static LISTING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<filetype>.)\S*\s.*\[\s*(?P<start>\d+)\s+\d+\]\s+(?P<name>.+?)\s*$")
        .expect("listing pattern is valid")
});

/// A file entry of a mastered ISO image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsoListingEntry {
    pub name: String,
    pub filetype: char,
    pub start: u32,
}

/// Lists the regular files of the image, ordered by start sector.
pub fn list_iso(isofile: &Path, config: &IsoConfig) -> Result<Vec<IsoListingEntry>> {
    let tool = match &config.listing_tool {
        Some(tool) => tool.clone(),
        None => find_tool(LISTING_TOOLS).ok_or_else(|| {
            IsoError::Tool(format!("No iso listing tool found, searched {LISTING_TOOLS:?}"))
        })?,
    };
    let output = run_command(&tool, &[Path::new("-R"), Path::new("-l"), Path::new("-i"), isofile])?;
    Ok(parse_iso_listing(&output.stdout))
}

/// Parses `isoinfo -l` output.
///
/// Only regular files are kept, one per start sector. When several files share
/// a start sector, as empty files may, the last listed one is kept.
pub fn parse_iso_listing(output: &str) -> Vec<IsoListingEntry> {
    let mut files: BTreeMap<u32, IsoListingEntry> = BTreeMap::new();
    for line in output.lines() {
        let Some(caps) = LISTING_LINE.captures(line) else {
            continue;
        };
        let filetype = caps["filetype"].chars().next().unwrap_or(' ');
        if filetype != '-' {
            continue;
        }
        let Ok(start) = caps["start"].parse::<u32>() else {
            continue;
        };
        files.insert(
            start,
            IsoListingEntry {
                name: caps["name"].to_string(),
                filetype,
                start,
            },
        );
    }
    files.into_values().collect()
}
