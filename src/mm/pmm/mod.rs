//! # PMM - Physical Memory Manager (interface consumida)
//!
//! O alocador físico é externo a este crate. Aqui só existe o contrato
//! usado pelos pools de páginas sombra: alocar um frame de uma zona e
//! devolvê-lo.

pub mod zones;

pub use zones::{MemoryLayout, ZoneType};

use crate::mm::page::Page;

/// Fonte de frames físicos fornecida pelo kernel.
pub trait FrameSource: Send + Sync {
    /// Aloca um frame da zona pedida (ou de uma zona mais baixa).
    fn alloc_frame(&self, zone: ZoneType) -> Option<Page>;

    /// Devolve um frame ao alocador.
    fn free_frame(&self, page: Page);
}
