//! # Estatísticas do HighMem

use core::sync::atomic::{AtomicU64, Ordering};

/// Contadores vivos (um conjunto por instância de `HighMem`)
#[derive(Default)]
pub struct KmapCounters {
    pub kmaps: AtomicU64,
    pub kunmaps: AtomicU64,
    pub lowmem_hits: AtomicU64,
    pub index_hits: AtomicU64,
    pub reclaims: AtomicU64,
    pub reclaimed_slots: AtomicU64,
    pub tlb_range_flushes: AtomicU64,
    pub waits: AtomicU64,
    pub atomic_maps: AtomicU64,
}

impl KmapCounters {
    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot das estatísticas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KmapStats {
    pub kmaps: u64,
    pub kunmaps: u64,
    /// kmap de página baixa (sem janela)
    pub lowmem_hits: u64,
    /// kmap resolvido por janela já existente
    pub index_hits: u64,
    /// Passes de reclaim executados
    pub reclaims: u64,
    /// Janelas liberadas por reclaim
    pub reclaimed_slots: u64,
    pub tlb_range_flushes: u64,
    /// Vezes em que um kmap esperou por capacidade
    pub waits: u64,
    pub atomic_maps: u64,
    /// Janelas com página
    pub bound_slots: u64,
    /// Janelas livres (count == 0)
    pub free_slots: u64,
}

impl KmapCounters {
    pub fn snapshot(&self, bound_slots: u64, free_slots: u64) -> KmapStats {
        KmapStats {
            kmaps: self.kmaps.load(Ordering::Relaxed),
            kunmaps: self.kunmaps.load(Ordering::Relaxed),
            lowmem_hits: self.lowmem_hits.load(Ordering::Relaxed),
            index_hits: self.index_hits.load(Ordering::Relaxed),
            reclaims: self.reclaims.load(Ordering::Relaxed),
            reclaimed_slots: self.reclaimed_slots.load(Ordering::Relaxed),
            tlb_range_flushes: self.tlb_range_flushes.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            atomic_maps: self.atomic_maps.load(Ordering::Relaxed),
            bound_slots,
            free_slots,
        }
    }
}
