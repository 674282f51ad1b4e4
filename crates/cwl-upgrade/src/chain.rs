//! Hop table and upgrade entry points

use crate::error::UpgradeError;
use crate::hop::{HopEntry, ReapplyPolicy};
use crate::hops::{UpgradeV1_0, UpgradeV1_1};
use cwl_document::{CwlVersion, Document};
use tracing::debug;

/// All hops, ordered by source version
pub static HOPS: [HopEntry; 2] = [HopEntry::of::<UpgradeV1_0>(), HopEntry::of::<UpgradeV1_1>()];

/// Hops between `from` and `to`, in application order
pub fn path(from: CwlVersion, to: CwlVersion) -> impl Iterator<Item = &'static HopEntry> {
    HOPS.iter().filter(move |hop| hop.from >= from && hop.to <= to)
}

/// Parse a version tag
///
/// # Errors
/// `UnsupportedVersion` for tags outside the supported set
pub fn parse_version(tag: &str) -> Result<CwlVersion, UpgradeError> {
    tag.parse()
        .map_err(|_| UpgradeError::unsupported(tag, "unknown schema version"))
}

/// Upgrade `document` along the hops from `from` to `to`
///
/// The input is never modified; each hop yields a new document.
///
/// A document already past some hop on the path is handled by that hop's
/// [`ReapplyPolicy`]: `Reject` fails, `Idempotent` skips the hop. With
/// `from == to` the hops between `from` and the document's own version
/// decide in the same way.
///
/// # Errors
/// - `UnsupportedVersion` for a downgrade or a document older than `from`
/// - `AlreadyUpgraded` when a rejecting hop would be applied again
pub fn upgrade(document: &Document, from: CwlVersion, to: CwlVersion) -> Result<Document, UpgradeError> {
    if to < from {
        return Err(UpgradeError::unsupported(
            to,
            format!("cannot downgrade from {from}"),
        ));
    }
    let current = document.version();
    if current < from {
        return Err(UpgradeError::unsupported(
            current,
            format!("{} is older than the requested origin {from}", document.uri()),
        ));
    }
    if from == to && current > from {
        // the document already went through every hop up to its version
        if let Some(hop) = path(from, current).find(|hop| hop.policy == ReapplyPolicy::Reject) {
            return Err(UpgradeError::AlreadyUpgraded {
                uri: document.uri().to_string(),
                current,
                from: hop.from,
                to: hop.to,
            });
        }
        return Ok(document.clone());
    }

    let mut upgraded = document.clone();
    for hop in path(from, to) {
        if upgraded.version() >= hop.to {
            match hop.policy {
                ReapplyPolicy::Idempotent => continue,
                ReapplyPolicy::Reject => {
                    return Err(UpgradeError::AlreadyUpgraded {
                        uri: document.uri().to_string(),
                        current,
                        from: hop.from,
                        to: hop.to,
                    })
                }
            }
        }
        debug!(uri = %document.uri(), from = %hop.from, to = %hop.to, "applying upgrade hop");
        upgraded = hop.apply(&upgraded)?;
    }
    Ok(upgraded)
}

/// Upgrade `document` from its declared version to `to`
///
/// # Errors
/// See [`upgrade`]
pub fn upgrade_to(document: &Document, to: CwlVersion) -> Result<Document, UpgradeError> {
    upgrade(document, document.version(), to)
}
