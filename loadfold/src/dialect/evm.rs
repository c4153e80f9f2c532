//! Builtin table of the EVM-flavoured dialect

use std::collections::HashMap;

use super::{BuiltinFunction, BuiltinRole, Dialect, SideEffects, StoreLoadLocation};

const NONE: SideEffects = SideEffects::none();
const READS_MEMORY: SideEffects = SideEffects {
    reads_memory: true,
    ..SideEffects::none()
};
const WRITES_MEMORY: SideEffects = SideEffects {
    writes_memory: true,
    ..SideEffects::none()
};
const READS_STORAGE: SideEffects = SideEffects {
    reads_storage: true,
    ..SideEffects::none()
};
const WRITES_STORAGE: SideEffects = SideEffects {
    writes_storage: true,
    ..SideEffects::none()
};
const HALTS: SideEffects = SideEffects {
    other_effect: true,
    ..SideEffects::none()
};
const HALTS_READING_MEMORY: SideEffects = SideEffects {
    reads_memory: true,
    other_effect: true,
    ..SideEffects::none()
};
/// Logs read their payload from memory and are externally observable
const LOGS: SideEffects = HALTS_READING_MEMORY;
/// Message calls may re-enter and change storage; output lands in memory
const MESSAGE_CALL: SideEffects = SideEffects::worst();
/// Static calls cannot change state but still write their output to memory
const STATIC_CALL: SideEffects = SideEffects {
    reads_memory: true,
    writes_memory: true,
    reads_storage: true,
    writes_storage: false,
    other_effect: true,
};
const CREATE: SideEffects = SideEffects {
    reads_memory: true,
    writes_memory: false,
    reads_storage: true,
    writes_storage: true,
    other_effect: true,
};

const fn builtin(
    name: &'static str,
    parameters: usize,
    returns: usize,
    side_effects: SideEffects,
) -> BuiltinFunction {
    BuiltinFunction {
        name,
        parameters,
        returns,
        side_effects,
        role: None,
    }
}

const fn with_role(
    name: &'static str,
    parameters: usize,
    returns: usize,
    side_effects: SideEffects,
    role: BuiltinRole,
) -> BuiltinFunction {
    BuiltinFunction {
        name,
        parameters,
        returns,
        side_effects,
        role: Some(role),
    }
}

const BUILTINS: &[BuiltinFunction] = &[
    // Arithmetic and comparison
    builtin("add", 2, 1, NONE),
    builtin("sub", 2, 1, NONE),
    builtin("mul", 2, 1, NONE),
    builtin("div", 2, 1, NONE),
    builtin("sdiv", 2, 1, NONE),
    builtin("mod", 2, 1, NONE),
    builtin("smod", 2, 1, NONE),
    builtin("exp", 2, 1, NONE),
    builtin("not", 1, 1, NONE),
    builtin("lt", 2, 1, NONE),
    builtin("gt", 2, 1, NONE),
    builtin("slt", 2, 1, NONE),
    builtin("sgt", 2, 1, NONE),
    builtin("eq", 2, 1, NONE),
    builtin("iszero", 1, 1, NONE),
    builtin("and", 2, 1, NONE),
    builtin("or", 2, 1, NONE),
    builtin("xor", 2, 1, NONE),
    builtin("byte", 2, 1, NONE),
    builtin("shl", 2, 1, NONE),
    builtin("shr", 2, 1, NONE),
    builtin("sar", 2, 1, NONE),
    builtin("addmod", 3, 1, NONE),
    builtin("mulmod", 3, 1, NONE),
    builtin("signextend", 2, 1, NONE),
    builtin("pop", 1, 0, NONE),
    // Environment
    builtin("address", 0, 1, NONE),
    builtin("balance", 1, 1, NONE),
    builtin("selfbalance", 0, 1, NONE),
    builtin("origin", 0, 1, NONE),
    builtin("caller", 0, 1, NONE),
    builtin("callvalue", 0, 1, NONE),
    builtin("calldataload", 1, 1, NONE),
    builtin("calldatasize", 0, 1, NONE),
    builtin("codesize", 0, 1, NONE),
    builtin("gasprice", 0, 1, NONE),
    builtin("extcodesize", 1, 1, NONE),
    builtin("extcodehash", 1, 1, NONE),
    builtin("returndatasize", 0, 1, NONE),
    builtin("blockhash", 1, 1, NONE),
    builtin("coinbase", 0, 1, NONE),
    builtin("timestamp", 0, 1, NONE),
    builtin("number", 0, 1, NONE),
    builtin("prevrandao", 0, 1, NONE),
    builtin("gaslimit", 0, 1, NONE),
    builtin("chainid", 0, 1, NONE),
    builtin("basefee", 0, 1, NONE),
    builtin("gas", 0, 1, NONE),
    // Memory
    with_role("mload", 1, 1, READS_MEMORY, BuiltinRole::Load(StoreLoadLocation::Memory)),
    with_role("mstore", 2, 0, WRITES_MEMORY, BuiltinRole::Store(StoreLoadLocation::Memory)),
    builtin("mstore8", 2, 0, WRITES_MEMORY),
    with_role("msize", 0, 1, READS_MEMORY, BuiltinRole::MemorySize),
    with_role("keccak256", 2, 1, READS_MEMORY, BuiltinRole::HashOfMemory),
    builtin("calldatacopy", 3, 0, WRITES_MEMORY),
    builtin("codecopy", 3, 0, WRITES_MEMORY),
    builtin("extcodecopy", 4, 0, WRITES_MEMORY),
    builtin("returndatacopy", 3, 0, WRITES_MEMORY),
    // Storage
    with_role("sload", 1, 1, READS_STORAGE, BuiltinRole::Load(StoreLoadLocation::Storage)),
    with_role("sstore", 2, 0, WRITES_STORAGE, BuiltinRole::Store(StoreLoadLocation::Storage)),
    // Logging
    builtin("log0", 2, 0, LOGS),
    builtin("log1", 3, 0, LOGS),
    builtin("log2", 4, 0, LOGS),
    builtin("log3", 5, 0, LOGS),
    builtin("log4", 6, 0, LOGS),
    // Calls and contract creation
    builtin("call", 7, 1, MESSAGE_CALL),
    builtin("callcode", 7, 1, MESSAGE_CALL),
    builtin("delegatecall", 6, 1, MESSAGE_CALL),
    builtin("staticcall", 6, 1, STATIC_CALL),
    builtin("create", 3, 1, CREATE),
    builtin("create2", 4, 1, CREATE),
    // Halting
    builtin("stop", 0, 0, HALTS),
    builtin("return", 2, 0, HALTS_READING_MEMORY),
    builtin("revert", 2, 0, HALTS_READING_MEMORY),
    builtin("invalid", 0, 0, HALTS),
    builtin("selfdestruct", 1, 0, HALTS),
];

/// The EVM-flavoured dialect
#[derive(Debug, Clone)]
pub struct EvmDialect {
    builtins: HashMap<&'static str, BuiltinFunction>,
}

impl EvmDialect {
    pub fn new() -> Self {
        Self {
            builtins: BUILTINS
                .iter()
                .map(|builtin| (builtin.name, builtin.clone()))
                .collect(),
        }
    }
}

impl Default for EvmDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for EvmDialect {
    fn builtin(&self, name: &str) -> Option<&BuiltinFunction> {
        self.builtins.get(name)
    }

    fn builtin_with_role(&self, role: BuiltinRole) -> Option<&BuiltinFunction> {
        self.builtins
            .values()
            .find(|builtin| builtin.role == Some(role))
    }
}
