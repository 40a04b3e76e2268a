//! Pipeline identity: the fingerprint of everything that decides what a
//! pipeline produces from a given source.

use goldenhammer_core::hash::sha256_hex;

/// Identity of this pipeline implementation. Bumping the crate version
/// invalidates every cache written by an older one.
pub const PIPELINE_KIND: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Hash the pipeline kind, its name and every stage identity.
pub fn pipeline_identity(
    name: &str,
    importers: &[&str],
    processors: &[&str],
    packager: &str,
) -> String {
    let mut text = format!("{PIPELINE_KIND}\n{name}\n");
    for importer in importers {
        text.push_str("importer:");
        text.push_str(importer);
        text.push('\n');
    }
    for processor in processors {
        text.push_str("processor:");
        text.push_str(processor);
        text.push('\n');
    }
    text.push_str("packager:");
    text.push_str(packager);
    sha256_hex(text)
}
