//! Gas cost model for the local profitability decision of a rewrite
//!
//! Only the handful of quantities the hash folding rule needs are modelled:
//! the runtime cost of the hashing instruction sequence and the cost of the
//! extra code bytes a full-word literal adds.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Bytes added by replacing `PUSH1 p PUSH1 n KECCAK256` (5 bytes) with a
/// `PUSH32 digest` (33 bytes).
pub const PUSH32_EXTRA_BYTES: u64 = 28;

/// Metering constants of the target machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostModel {
    /// Base cost of the hashing instruction
    pub hash_base_cost: u64,
    /// Hashing cost per started 32-byte word
    pub hash_word_cost: u64,
    /// Cost of a mid-tier instruction (the removed push)
    pub mid_tier_cost: u64,
    /// Per-byte cost of code that only ever runs at deployment
    /// (paid as transaction data)
    pub creation_byte_cost: u64,
    /// Per-byte cost of code stored as deployed runtime code
    pub runtime_byte_cost: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            hash_base_cost: 30,
            hash_word_cost: 6,
            mid_tier_cost: 3,
            creation_byte_cost: 16,
            runtime_byte_cost: 200,
        }
    }
}

impl CostModel {
    /// Gas for embedding `bytes` bytes of immediate data
    pub fn deploy_byte_cost(&self, bytes: u64, is_deploy_only_code: bool) -> BigUint {
        let per_byte = if is_deploy_only_code {
            self.creation_byte_cost
        } else {
            self.runtime_byte_cost
        };
        BigUint::from(bytes) * BigUint::from(per_byte)
    }

    /// Gas saved on every execution when a single-word hash becomes a literal
    pub fn hash_runtime_savings(&self) -> BigUint {
        BigUint::from(self.hash_base_cost) + BigUint::from(self.hash_word_cost) + BigUint::from(self.mid_tier_cost)
    }

    /// One-time cost of the larger literal.
    ///
    /// Without an execution hint the code is assumed to run once, as
    /// deploy-only code.
    pub fn hash_fold_deploy_loss(&self, expected_executions: Option<u64>) -> BigUint {
        self.deploy_byte_cost(PUSH32_EXTRA_BYTES, expected_executions.is_none())
    }

    /// Whether folding a hash pays for itself
    pub fn hash_fold_profitable(&self, expected_executions: Option<u64>) -> bool {
        let savings = self.hash_runtime_savings();
        let loss = self.hash_fold_deploy_loss(expected_executions);
        match expected_executions {
            None => savings >= loss,
            Some(executions) => BigUint::from(executions) * savings >= loss,
        }
    }
}
