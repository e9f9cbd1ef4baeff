//! # Zonas de Memória Física
//!
//! Divide a memória física em zonas conforme quem consegue endereçá-la.
//!
//! ## 🎯 Propósito
//!
//! - **DMA** (0-16MB): dispositivos ISA legados (24 bits). Fonte do pool ISA.
//! - **Normal** (16MB - `max_low_pfn`): direct map permanente do kernel.
//!   Fonte das páginas sombra do pool geral.
//! - **HighMem** (`max_low_pfn` - `max_pfn`): fora do direct map; só é
//!   acessível através de uma janela kmap.
//!
//! ```text
//! 0 ──── 16MB ─────────── max_low_pfn ─────────── max_pfn
//! │  DMA  │     Normal       │        HighMem        │
//! └───────┴── direct map ────┴──── janelas kmap ─────┘
//! ```

use crate::mm::addr::{phys_to_pfn, Pfn, PhysAddr};
use crate::mm::config::ISA_DMA_THRESHOLD;
use crate::mm::page::{Page, PageFlags};

// =============================================================================
// DEFINIÇÃO DE ZONAS
// =============================================================================

/// Tipo de zona de memória
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ZoneType {
    /// DMA Zone: 0 - 16 MB
    Dma = 0,
    /// Normal Zone: direct map
    Normal = 1,
    /// HighMem Zone: acima de max_low_pfn
    HighMem = 2,
}

impl ZoneType {
    /// Nome da zona
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dma => "DMA",
            Self::Normal => "Normal",
            Self::HighMem => "HighMem",
        }
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Fronteiras físicas informadas pelo boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Primeiro frame fora do direct map
    pub max_low_pfn: Pfn,
    /// Primeiro frame além da RAM instalada
    pub max_pfn: Pfn,
}

impl MemoryLayout {
    pub const fn new(max_low_pfn: Pfn, max_pfn: Pfn) -> Self {
        Self {
            max_low_pfn,
            max_pfn,
        }
    }

    /// Existe RAM fora do direct map?
    #[inline]
    pub fn has_highmem(&self) -> bool {
        self.max_pfn > self.max_low_pfn
    }

    /// Primeiro frame acima da zona DMA
    #[inline]
    pub fn isa_limit_pfn() -> Pfn {
        phys_to_pfn(PhysAddr::new(ISA_DMA_THRESHOLD))
    }

    /// Determina a zona de um frame
    pub fn zone_of(&self, pfn: Pfn) -> ZoneType {
        if pfn < Self::isa_limit_pfn() {
            ZoneType::Dma
        } else if pfn < self.max_low_pfn {
            ZoneType::Normal
        } else {
            ZoneType::HighMem
        }
    }

    /// Constrói a referência de página com o atributo HIGHMEM correto
    pub fn page(&self, pfn: Pfn) -> Page {
        match self.zone_of(pfn) {
            ZoneType::HighMem => Page::new(pfn, PageFlags::HIGHMEM),
            _ => Page::low(pfn),
        }
    }
}
