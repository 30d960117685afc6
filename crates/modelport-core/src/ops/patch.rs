//! Capability patches applied to the operator table before a model is touched.
//!
//! A patch injects a primitive the runtime is missing. The registry remembers
//! the first captured original per target, so `apply` is idempotent and a
//! single `revert` restores the true pre-patch state no matter how many times
//! the same patch ran. Patches must be applied strictly before load/export
//! begins; the orchestrator never reverts between strategy attempts within
//! one run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{rms_norm_fallback, OpKernel, OpTable, REQUIRED_FORWARD_OPS, RMS_NORM};
use crate::error::ModelportError;

/// One capability patch: target operator name plus replacement kernel.
#[derive(Clone)]
pub struct PatchSpec {
    pub target: String,
    pub replacement: OpKernel,
}

impl PatchSpec {
    pub fn new(target: impl Into<String>, replacement: OpKernel) -> Self {
        Self {
            target: target.into(),
            replacement,
        }
    }
}

impl std::fmt::Debug for PatchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchSpec").field("target", &self.target).finish()
    }
}

/// Patches the conversion entry points apply by default. Currently the
/// `rms_norm` decomposition, for runtimes that ship without the primitive.
pub fn standard_patches() -> Vec<PatchSpec> {
    vec![PatchSpec::new(RMS_NORM, Arc::new(rms_norm_fallback))]
}

/// Applies and reverts capability patches on an operator table.
#[derive(Default)]
pub struct PatchRegistry {
    /// Target -> original kernel captured at the *first* apply.
    /// `None` means the target did not exist before patching.
    originals: HashMap<String, Option<OpKernel>>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `spec.replacement` for `spec.target`. Idempotent: repeated
    /// applications keep the original captured the first time.
    pub fn apply(&mut self, table: &mut OpTable, spec: &PatchSpec) {
        self.originals
            .entry(spec.target.clone())
            .or_insert_with(|| table.get(&spec.target));
        table.register(&spec.target, spec.replacement.clone());
        debug!(target_op = %spec.target, "applied capability patch");
    }

    /// Restore the pre-patch state for one target: reinstate the captured
    /// original, or remove the symbol if none existed. A no-op for targets
    /// this registry never patched.
    pub fn revert(&mut self, table: &mut OpTable, target: &str) {
        match self.originals.remove(target) {
            Some(Some(original)) => table.register(target, original),
            Some(None) => {
                table.remove(target);
            }
            None => {}
        }
    }

    /// Revert every patch this registry applied.
    pub fn revert_all(&mut self, table: &mut OpTable) {
        let targets: Vec<String> = self.originals.keys().cloned().collect();
        for target in targets {
            self.revert(table, &target);
        }
    }

    pub fn is_patched(&self, target: &str) -> bool {
        self.originals.contains_key(target)
    }
}

/// Report forward-pass primitives still missing after patching, one patch
/// error per absent target. A missing primitive is not fatal here — the run
/// continues and fails only if a strategy actually exercises it.
pub fn verify_required(table: &OpTable) -> Vec<ModelportError> {
    let missing: Vec<ModelportError> = REQUIRED_FORWARD_OPS
        .iter()
        .filter(|op| !table.contains(op))
        .map(|op| ModelportError::Patch {
            target: (*op).to_string(),
            message: "primitive missing after patching; strategies exercising it will fail".into(),
        })
        .collect();
    for err in &missing {
        warn!("{err}");
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpInvoker;
    use crate::tensor::Tensor;

    fn norm_inputs() -> Vec<Tensor> {
        vec![
            Tensor::f32(vec![1, 1, 2], vec![3.0, 4.0]).unwrap(),
            Tensor::f32(vec![2], vec![1.0, 1.0]).unwrap(),
        ]
    }

    #[test]
    fn test_apply_injects_missing_primitive() {
        let mut table = OpTable::builtin();
        let mut registry = PatchRegistry::new();
        assert!(!table.contains(RMS_NORM));

        for spec in standard_patches() {
            registry.apply(&mut table, &spec);
        }
        assert!(table.contains(RMS_NORM));
        assert!(table.invoke(RMS_NORM, &norm_inputs()).is_ok());
    }

    #[test]
    fn test_apply_is_idempotent_and_revert_restores_absence() {
        let mut table = OpTable::builtin();
        let mut registry = PatchRegistry::new();
        let spec = &standard_patches()[0];

        // N applies, one revert: the symbol must be gone again because it
        // did not exist before the first apply.
        registry.apply(&mut table, spec);
        registry.apply(&mut table, spec);
        registry.apply(&mut table, spec);
        registry.revert(&mut table, RMS_NORM);
        assert!(!table.contains(RMS_NORM));
    }

    #[test]
    fn test_revert_restores_preexisting_original() {
        let mut table = OpTable::builtin();
        // A runtime that already has rms_norm: identity stand-in.
        table.register(RMS_NORM, Arc::new(|inputs: &[Tensor]| Ok(inputs[0].clone())));

        let mut registry = PatchRegistry::new();
        let spec = &standard_patches()[0];
        registry.apply(&mut table, spec);
        registry.apply(&mut table, spec);

        // Patched kernel actually normalizes.
        let patched = table.invoke(RMS_NORM, &norm_inputs()).unwrap();
        assert!((patched.as_f32().unwrap()[0] - 3.0 / 12.5f32.sqrt()).abs() < 1e-4);

        // One revert restores the identity original captured first.
        registry.revert(&mut table, RMS_NORM);
        let original = table.invoke(RMS_NORM, &norm_inputs()).unwrap();
        assert_eq!(original.as_f32().unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn test_revert_all() {
        let mut table = OpTable::builtin();
        let mut registry = PatchRegistry::new();
        for spec in standard_patches() {
            registry.apply(&mut table, &spec);
        }
        registry.revert_all(&mut table);
        assert!(!table.contains(RMS_NORM));
        assert!(!registry.is_patched(RMS_NORM));
    }

    #[test]
    fn test_verify_required_reports_missing() {
        let table = OpTable::builtin();
        let missing = verify_required(&table);
        assert_eq!(missing.len(), 1);
        assert!(
            matches!(&missing[0], ModelportError::Patch { target, .. } if target == RMS_NORM)
        );
        assert!(missing[0].to_string().contains("rms_norm"));

        let mut patched = table.clone();
        let mut registry = PatchRegistry::new();
        for spec in standard_patches() {
            registry.apply(&mut patched, &spec);
        }
        assert!(verify_required(&patched).is_empty());
    }
}
