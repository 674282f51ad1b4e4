//! Typed upgrade hops
//!
//! A hop upgrades a document from one schema version to the next. Versions
//! are marker types, so a hop can only be fed a tree of its source version
//! and only yields a tree of its target version:
//!
//! ```text
//! VersionedTree<V1_0> --UpgradeV1_0--> VersionedTree<V1_1> --UpgradeV1_1--> VersionedTree<V1_2>
//! ```

use crate::error::UpgradeError;
use cwl_document::{CwlVersion, Document, Value};
use std::marker::PhantomData;

/// Schema version marker
pub trait SchemaVersion {
    /// Runtime version tag
    const VERSION: CwlVersion;
}

/// Marker for `v1.0`
#[derive(Debug, Clone, Copy)]
pub struct V1_0;

/// Marker for `v1.1`
#[derive(Debug, Clone, Copy)]
pub struct V1_1;

/// Marker for `v1.2`
#[derive(Debug, Clone, Copy)]
pub struct V1_2;

impl SchemaVersion for V1_0 {
    const VERSION: CwlVersion = CwlVersion::V1_0;
}

impl SchemaVersion for V1_1 {
    const VERSION: CwlVersion = CwlVersion::V1_1;
}

impl SchemaVersion for V1_2 {
    const VERSION: CwlVersion = CwlVersion::V1_2;
}

/// Document statically known to be written against version `V`
#[derive(Debug, Clone)]
pub struct VersionedTree<V> {
    document: Document,
    _version: PhantomData<V>,
}

impl<V: SchemaVersion> VersionedTree<V> {
    /// Wrap a document of version `V`
    ///
    /// # Errors
    /// `UnsupportedVersion` if the document declares another version
    pub fn new(document: Document) -> Result<Self, UpgradeError> {
        if document.version() != V::VERSION {
            return Err(UpgradeError::unsupported(
                document.version(),
                format!("expected a {} document", V::VERSION),
            ));
        }
        Ok(Self {
            document,
            _version: PhantomData,
        })
    }

    /// Wrapped document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Unwrap
    #[inline]
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Rewrite every process and retag as `W`
    fn convert<W: SchemaVersion>(self, f: impl FnMut(Value) -> Value) -> VersionedTree<W> {
        VersionedTree {
            document: self.document.map_processes(f).with_version(W::VERSION),
            _version: PhantomData,
        }
    }
}

/// What happens when a document already past a hop's target goes through it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapplyPolicy {
    /// Fail with `AlreadyUpgraded`
    Reject,
    /// Pass the document through unchanged
    Idempotent,
}

/// One upgrade step between adjacent versions
pub trait Hop {
    /// Source version
    type From: SchemaVersion;
    /// Target version
    type To: SchemaVersion;
    /// Behavior on documents already past `To`
    const POLICY: ReapplyPolicy;

    /// Rewrite one process tree
    fn upgrade_process(process: Value) -> Value;

    /// Upgrade a whole document; process count, order and ids are kept
    fn upgrade(tree: VersionedTree<Self::From>) -> VersionedTree<Self::To> {
        tree.convert(Self::upgrade_process)
    }
}

/// Type-erased entry of the hop table
#[derive(Debug, Clone, Copy)]
pub struct HopEntry {
    /// Source version
    pub from: CwlVersion,
    /// Target version
    pub to: CwlVersion,
    /// Re-application policy
    pub policy: ReapplyPolicy,
    run: fn(&Document) -> Result<Document, UpgradeError>,
}

impl HopEntry {
    /// Entry for hop `H`
    #[must_use]
    pub const fn of<H: Hop>() -> Self {
        Self {
            from: <H::From as SchemaVersion>::VERSION,
            to: <H::To as SchemaVersion>::VERSION,
            policy: H::POLICY,
            run: run_hop::<H>,
        }
    }

    /// Apply the hop
    ///
    /// # Errors
    /// `UnsupportedVersion` if `document` is not at [`HopEntry::from`]
    pub fn apply(&self, document: &Document) -> Result<Document, UpgradeError> {
        (self.run)(document)
    }
}

fn run_hop<H: Hop>(document: &Document) -> Result<Document, UpgradeError> {
    let tree = VersionedTree::<H::From>::new(document.clone())?;
    Ok(H::upgrade(tree).into_document())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwl_document::DocumentUri;
    use serde_json::json;

    struct AddLabel;

    impl Hop for AddLabel {
        type From = V1_0;
        type To = V1_1;
        const POLICY: ReapplyPolicy = ReapplyPolicy::Reject;

        fn upgrade_process(mut process: Value) -> Value {
            process["label"] = json!("upgraded");
            process
        }
    }

    fn doc(version: CwlVersion) -> Document {
        let uri = DocumentUri::parse("file:///t/a.cwl").unwrap();
        Document::new(uri, version, vec![json!({"id": "a"})])
    }

    #[test]
    fn versioned_tree_checks_version() {
        assert!(VersionedTree::<V1_0>::new(doc(CwlVersion::V1_0)).is_ok());
        assert!(VersionedTree::<V1_0>::new(doc(CwlVersion::V1_2)).is_err());
    }

    #[test]
    fn entry_runs_hop() {
        const ENTRY: HopEntry = HopEntry::of::<AddLabel>();
        assert_eq!(ENTRY.from, CwlVersion::V1_0);
        assert_eq!(ENTRY.to, CwlVersion::V1_1);

        let upgraded = ENTRY.apply(&doc(CwlVersion::V1_0)).unwrap();
        assert_eq!(upgraded.version(), CwlVersion::V1_1);
        assert_eq!(upgraded.processes()[0]["label"], "upgraded");
        assert!(ENTRY.apply(&upgraded).is_err());
    }
}
