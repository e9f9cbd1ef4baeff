//! # Addr - Wrappers Type-Safe para Endereços
//!
//! Tipos distintos para frame físico (`Pfn`), endereço físico e endereço
//! virtual. Nunca se convertem implicitamente: toda troca passa por
//! `translate`.

mod pfn;
mod phys;
mod translate;
mod virt;

pub use pfn::Pfn;
pub use phys::PhysAddr;
pub use translate::{phys_to_pfn, window_addr, window_index};
pub use virt::VirtAddr;
