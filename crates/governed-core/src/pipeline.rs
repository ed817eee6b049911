//! The verification pipeline.
//!
//! ```text
//! START ─► Structural ─fail─► STOP (layer_failed = structural)
//!              │
//!              ▼
//!          Grounding ─fail─► STOP (layer_failed = grounding)
//!              │
//!              ▼
//!       needs_council? ─► DONE
//! ```
//!
//! Custom tasks skip both gates and always need a council. In council mode
//! the fact check runs here, synchronously, so its scores are known before
//! any reviewer is dispatched.

use std::borrow::Cow;

use crate::contract::TaskContract;
use crate::facts::FactChecker;
use crate::gates::{Gate, GroundingGate, StructuralGate};
use crate::profiles::ProfileRegistry;
use crate::types::{TaskType, VerificationMode, VerificationResult};

/// Runs the gates for a contract's profile.
#[derive(Clone)]
pub struct Pipeline {
    registry: Cow<'static, ProfileRegistry>,
    structural: StructuralGate,
    grounding: GroundingGate,
    fact_checker: FactChecker,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Pipeline over the process-wide built-in profiles and default gates.
    pub fn new() -> Self {
        Self {
            registry: Cow::Borrowed(ProfileRegistry::global()),
            structural: StructuralGate::new(),
            grounding: GroundingGate::new(),
            fact_checker: FactChecker::new(),
        }
    }

    pub fn with_registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = Cow::Owned(registry);
        self
    }

    pub fn with_grounding_gate(mut self, gate: GroundingGate) -> Self {
        self.grounding = gate;
        self
    }

    pub fn with_fact_checker(mut self, checker: FactChecker) -> Self {
        self.fact_checker = checker;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn fact_checker(&self) -> &FactChecker {
        &self.fact_checker
    }

    /// Verify an output against its contract.
    pub fn run(&self, contract: &TaskContract, output: &str) -> VerificationResult {
        let needs_council = contract.verification_mode == VerificationMode::Council
            || contract.task_type == TaskType::Custom;

        if contract.task_type == TaskType::Custom {
            tracing::debug!("Custom task, gates skipped");
            return self.cleared(contract, output, needs_council, Vec::new());
        }

        let profile = self.registry.get(contract.task_type);
        let mut warnings = Vec::new();

        let gates: [&dyn Gate; 2] = [&self.structural, &self.grounding];
        for gate in gates {
            let result = gate.run(output, profile);
            if !result.passed {
                tracing::debug!(
                    task_type = %contract.task_type,
                    layer = %gate.layer(),
                    failures = result.failures.len(),
                    "Verification stopped"
                );
                return VerificationResult::stopped_at(gate.layer(), result, warnings);
            }
            warnings.extend(result.warnings);
        }

        self.cleared(contract, output, needs_council, warnings)
    }

    fn cleared(
        &self,
        contract: &TaskContract,
        output: &str,
        needs_council: bool,
        warnings: Vec<String>,
    ) -> VerificationResult {
        let result = VerificationResult::cleared(needs_council, warnings);
        if contract.verification_mode == VerificationMode::Council {
            let report = self
                .fact_checker
                .check(output, &contract.user_provided_context);
            result.with_fact_check(report)
        } else {
            result
        }
    }
}

/// Verify an output with the built-in profiles.
pub fn run_non_coding_verification(contract: &TaskContract, output: &str) -> VerificationResult {
    Pipeline::new().run(contract, output)
}
