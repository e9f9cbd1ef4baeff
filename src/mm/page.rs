//! # Page
//!
//! Referência leve a uma página física. A página pertence ao alocador
//! físico; este subsistema só a referencia (nunca é dono).

use crate::mm::addr::Pfn;
use bitflags::bitflags;
use core::hash::{Hash, Hasher};

bitflags! {
    /// Atributos de página relevantes para o HighMem
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Fora da região permanentemente mapeada
        const HIGHMEM = 1 << 0;
        /// Página sombra de um pool de bounce
        const BOUNCE  = 1 << 1;
    }
}

/// Página física identificada pelo seu frame.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pfn: Pfn,
    flags: PageFlags,
}

impl Page {
    #[inline]
    pub const fn new(pfn: Pfn, flags: PageFlags) -> Self {
        Self { pfn, flags }
    }

    /// Página do direct map
    #[inline]
    pub const fn low(pfn: Pfn) -> Self {
        Self::new(pfn, PageFlags::empty())
    }

    /// Página fora do direct map
    #[inline]
    pub const fn high(pfn: Pfn) -> Self {
        Self::new(pfn, PageFlags::HIGHMEM)
    }

    #[inline]
    pub const fn pfn(&self) -> Pfn {
        self.pfn
    }

    #[inline]
    pub const fn flags(&self) -> PageFlags {
        self.flags
    }

    #[inline]
    pub const fn is_highmem(&self) -> bool {
        self.flags.contains(PageFlags::HIGHMEM)
    }

    #[inline]
    pub fn with_flags(self, extra: PageFlags) -> Self {
        Self::new(self.pfn, self.flags | extra)
    }
}

// Identidade da página é o frame; flags são atributos derivados.
impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.pfn == other.pfn
    }
}

impl Eq for Page {}

impl Hash for Page {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pfn.hash(state);
    }
}
