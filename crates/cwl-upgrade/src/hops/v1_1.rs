//! v1.1 → v1.2
//!
//! v1.2 only adds to v1.1 (conditional steps, `pickValue`, `Operation`), so
//! every v1.1 document is a valid v1.2 document once retagged.

use crate::hop::{Hop, ReapplyPolicy, V1_1, V1_2};
use cwl_document::Value;

/// v1.1 → v1.2 upgrade
#[derive(Debug, Clone, Copy)]
pub struct UpgradeV1_1;

impl Hop for UpgradeV1_1 {
    type From = V1_1;
    type To = V1_2;
    const POLICY: ReapplyPolicy = ReapplyPolicy::Idempotent;

    #[inline]
    fn upgrade_process(process: Value) -> Value {
        process
    }
}
