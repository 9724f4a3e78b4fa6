// hybridiso/src/iso/mod.rs
pub mod boot_catalog;
pub mod header_end;
pub mod hybrid;
pub mod listing;
pub mod parameters;
pub mod relocation;
pub mod volume_descriptor;

#[cfg(test)]
mod test_image;
