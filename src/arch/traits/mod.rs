//! Traits do Hardware Abstraction Layer (HAL).
//! Interfaces que o subsistema usa para falar com o hardware.

pub mod cpu;
pub mod mmu;

// Re-exportar para facilitar uso: `use crate::arch::traits::CpuOps;`
pub use cpu::{CoreId, CpuOps};
pub use mmu::MmuOps;
