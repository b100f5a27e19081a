//! Memory budget queries for cache sizing and fetch admission.
//!
//! The cache capacity and the pre-buffering admission check both ask "how
//! much memory can we still spend?". That question is answered through the
//! [`MemoryBudget`] trait so production code can query the OS while tests
//! and constrained deployments pin a fixed figure.

use std::sync::Mutex;
use sysinfo::System;

use crate::error::FetchError;

/// Fraction of the available budget the asset cache may claim at construction.
pub const CACHE_MEMORY_DIVISOR: u64 = 8;

/// Reports the currently available memory budget in bytes.
pub trait MemoryBudget: Send + Sync {
    fn available(&self) -> u64;
}

/// Budget backed by the OS-reported available memory.
pub struct SystemBudget {
    system: Mutex<System>,
}

impl SystemBudget {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBudget for SystemBudget {
    fn available(&self) -> u64 {
        match self.system.lock() {
            Ok(mut system) => {
                system.refresh_memory();
                system.available_memory()
            }
            Err(_) => 0,
        }
    }
}

/// Fixed budget for tests and for deployments with a configured ceiling.
pub struct FixedBudget(pub u64);

impl MemoryBudget for FixedBudget {
    fn available(&self) -> u64 {
        self.0
    }
}

/// Cache capacity in cost units (bytes), derived once at construction.
pub fn cache_capacity(budget: &dyn MemoryBudget) -> u64 {
    budget.available() / CACHE_MEMORY_DIVISOR
}

/// Admission check run before buffering a response body.
///
/// A missing declared length skips the check; this mirrors admitting
/// responses without a Content-Length header. Not an exact accounting
/// guarantee, only a guard against obviously oversized bodies.
pub fn admit(budget: &dyn MemoryBudget, declared_len: Option<u64>) -> Result<(), FetchError> {
    let Some(declared) = declared_len else {
        return Ok(());
    };

    let available = budget.available();
    if declared > available {
        return Err(FetchError::ResourceExhausted {
            declared,
            available,
        });
    }

    Ok(())
}
