//! Builtin functions and their side effects
//!
//! A `Dialect` answers capability queries about builtin names: what a
//! builtin does to storage and memory, and whether it plays one of the
//! roles the optimizer cares about (load, store, hash of a memory region,
//! memory-size query). Everything is computed up front and immutable.

mod evm;

pub use evm::EvmDialect;

use serde::{Deserialize, Serialize};

/// The two independently addressable regions of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreLoadLocation {
    Memory,
    Storage,
}

/// Effects of executing a builtin or user-defined function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffects {
    pub reads_memory: bool,
    pub writes_memory: bool,
    pub reads_storage: bool,
    pub writes_storage: bool,
    /// Observable effects outside both address spaces (logs, calls, halting)
    pub other_effect: bool,
}

impl SideEffects {
    /// No effects at all
    pub const fn none() -> Self {
        Self {
            reads_memory: false,
            writes_memory: false,
            reads_storage: false,
            writes_storage: false,
            other_effect: false,
        }
    }

    /// Everything may happen; used for unknown callees
    pub const fn worst() -> Self {
        Self {
            reads_memory: true,
            writes_memory: true,
            reads_storage: true,
            writes_storage: true,
            other_effect: true,
        }
    }

    pub fn reads(location: StoreLoadLocation) -> Self {
        let mut effects = Self::none();
        match location {
            StoreLoadLocation::Memory => effects.reads_memory = true,
            StoreLoadLocation::Storage => effects.reads_storage = true,
        }
        effects
    }

    pub fn writes(location: StoreLoadLocation) -> Self {
        let mut effects = Self::none();
        match location {
            StoreLoadLocation::Memory => effects.writes_memory = true,
            StoreLoadLocation::Storage => effects.writes_storage = true,
        }
        effects
    }

    /// Whether facts about `location` are invalidated by these effects
    pub fn invalidates(&self, location: StoreLoadLocation) -> bool {
        match location {
            StoreLoadLocation::Memory => self.writes_memory,
            StoreLoadLocation::Storage => self.writes_storage,
        }
    }
}

impl std::ops::BitOr for SideEffects {
    type Output = SideEffects;

    fn bitor(self, other: SideEffects) -> SideEffects {
        SideEffects {
            reads_memory: self.reads_memory || other.reads_memory,
            writes_memory: self.writes_memory || other.writes_memory,
            reads_storage: self.reads_storage || other.reads_storage,
            writes_storage: self.writes_storage || other.writes_storage,
            other_effect: self.other_effect || other.other_effect,
        }
    }
}

impl std::ops::BitOrAssign for SideEffects {
    fn bitor_assign(&mut self, other: SideEffects) {
        *self = *self | other;
    }
}

/// Special meaning of a builtin for the optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinRole {
    /// `load(key)`
    Load(StoreLoadLocation),
    /// `store(key, value)`
    Store(StoreLoadLocation),
    /// `hash(offset, length)` over a memory region
    HashOfMemory,
    /// Reports the current memory extent
    MemorySize,
}

/// A builtin function descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub parameters: usize,
    pub returns: usize,
    pub side_effects: SideEffects,
    pub role: Option<BuiltinRole>,
}

/// Capability queries the optimizer runs against a dialect
pub trait Dialect {
    /// Look up a builtin by name
    fn builtin(&self, name: &str) -> Option<&BuiltinFunction>;

    /// The builtin playing `role`, if the dialect has one
    fn builtin_with_role(&self, role: BuiltinRole) -> Option<&BuiltinFunction>;

    /// Side effects of a builtin; `None` for non-builtins
    fn effects_of(&self, name: &str) -> Option<SideEffects> {
        self.builtin(name).map(|builtin| builtin.side_effects)
    }

    fn role_of(&self, name: &str) -> Option<BuiltinRole> {
        self.builtin(name).and_then(|builtin| builtin.role)
    }

    fn is_hash_of_memory(&self, name: &str) -> bool {
        self.role_of(name) == Some(BuiltinRole::HashOfMemory)
    }

    fn is_memory_size_query(&self, name: &str) -> bool {
        self.role_of(name) == Some(BuiltinRole::MemorySize)
    }

    fn load_function(&self, location: StoreLoadLocation) -> Option<&'static str> {
        self.builtin_with_role(BuiltinRole::Load(location))
            .map(|builtin| builtin.name)
    }

    fn store_function(&self, location: StoreLoadLocation) -> Option<&'static str> {
        self.builtin_with_role(BuiltinRole::Store(location))
            .map(|builtin| builtin.name)
    }
}
