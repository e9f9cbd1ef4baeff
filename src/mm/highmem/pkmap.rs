//! # Pkmap - Janelas kmap persistentes
//!
//! Tabela fixa de N janelas virtuais reutilizáveis. Cada janela tem um
//! contador e, opcionalmente, a página ligada a ela:
//!
//! | count | Estado                                                  |
//! |-------|---------------------------------------------------------|
//! | 0     | livre, sem página, sem PTE                              |
//! | 1     | mapeada sem holders; TLB possivelmente stale até reclaim |
//! | n ≥ 2 | mapeada com `n - 1` holders ativos                       |
//!
//! Uma janela só desce de 1 para 0 dentro de um reclaim, que limpa todas as
//! PTEs ociosas e faz UM flush de TLB cobrindo a região inteira.
//!
//! Esta tabela não tem lock próprio: vive dentro do `Spinlock` do `HighMem`
//! (kmap_lock), junto com as atualizações do índice reverso.

use super::page_address::PageAddressMap;
use super::stats::KmapCounters;
use crate::arch::MmuOps;
use crate::mm::addr::{window_addr, window_index, VirtAddr};
use crate::mm::page::Page;
use alloc::boxed::Box;
use alloc::vec;

pub struct PkmapTable {
    counts: Box<[u32]>,
    pages: Box<[Option<Page>]>,
    /// Cursor round-robin: última janela entregue
    last_pkmap_nr: usize,
    base: VirtAddr,
}

impl PkmapTable {
    /// `slots` é potência de 2 (validado em `HighmemConfig`).
    pub fn new(slots: usize, base: VirtAddr) -> Self {
        Self {
            counts: vec![0u32; slots].into_boxed_slice(),
            pages: vec![None; slots].into_boxed_slice(),
            last_pkmap_nr: 0,
            base,
        }
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn slot_addr(&self, slot: usize) -> VirtAddr {
        window_addr(self.base, slot)
    }

    #[inline]
    pub fn slot_of(&self, vaddr: VirtAddr) -> Option<usize> {
        window_index(self.base, self.slots(), vaddr)
    }

    #[inline]
    pub fn count(&self, slot: usize) -> u32 {
        self.counts[slot]
    }

    #[inline]
    pub fn page_at(&self, slot: usize) -> Option<Page> {
        self.pages[slot]
    }

    /// Fim (exclusivo) da região de janelas
    #[inline]
    pub fn end(&self) -> VirtAddr {
        self.slot_addr(self.slots())
    }

    /// Janela da página: existente (índice) ou nova.
    ///
    /// `None` quando não há janela livre nem depois de um reclaim; o caller
    /// deve esperar e recomeçar. O contador NÃO é incrementado aqui (ver
    /// `pin`).
    pub fn acquire(
        &mut self,
        page: Page,
        index: &PageAddressMap,
        mmu: &dyn MmuOps,
        counters: &KmapCounters,
    ) -> Option<VirtAddr> {
        if let Some(vaddr) = index.lookup(page.pfn()) {
            KmapCounters::inc(&counters.index_hits);
            return Some(vaddr);
        }
        self.map_new_virtual(page, index, mmu, counters)
    }

    /// Procura janela livre a partir do cursor e liga a página a ela.
    fn map_new_virtual(
        &mut self,
        page: Page,
        index: &PageAddressMap,
        mmu: &dyn MmuOps,
        counters: &KmapCounters,
    ) -> Option<VirtAddr> {
        let mask = self.slots() - 1;
        let mut count = self.slots();

        loop {
            self.last_pkmap_nr = (self.last_pkmap_nr + 1) & mask;
            if self.last_pkmap_nr == 0 {
                // Deu a volta: recolher janelas ociosas
                self.flush_all_zero_pkmaps(index, mmu, counters);
                count = self.slots();
            }
            if self.counts[self.last_pkmap_nr] == 0 {
                break;
            }
            count -= 1;
            if count == 0 {
                crate::ktrace!("(Pkmap) Sem janela livre após reclaim, pfn=", page.pfn().as_u64());
                return None;
            }
        }

        let slot = self.last_pkmap_nr;
        let vaddr = self.slot_addr(slot);
        mmu.set_pte(vaddr, Some(page.pfn()));

        self.counts[slot] = 1;
        self.pages[slot] = Some(page);
        index.assign(page, vaddr);

        crate::ktrace!("(Pkmap) Janela ligada, slot=", slot);
        Some(vaddr)
    }

    /// Registra mais um holder na janela de `vaddr`.
    pub fn pin(&mut self, vaddr: VirtAddr) {
        let slot = match self.slot_of(vaddr) {
            Some(slot) => slot,
            None => crate::kbug!("(Pkmap) Endereço fora da região kmap=", vaddr.as_u64()),
        };
        self.counts[slot] += 1;
        if self.counts[slot] < 2 {
            crate::kbug!("(Pkmap) pin em janela sem página, slot=", slot);
        }
    }

    /// Remove um holder. Retorna `true` quando a janela ficou ociosa
    /// (count == 1) e alguém esperando por capacidade deve ser acordado.
    pub fn release(&mut self, slot: usize) -> bool {
        match self.counts[slot] {
            0 => crate::kbug!("(Pkmap) release de janela livre, slot=", slot),
            1 => crate::kbug!("(Pkmap) count 1 -> 0 fora do reclaim, slot=", slot),
            _ => {}
        }
        self.counts[slot] -= 1;
        self.counts[slot] == 1
    }

    /// Reclaim: libera toda janela com count == 1.
    ///
    /// Retorna quantas janelas foram liberadas.
    pub fn flush_all_zero_pkmaps(
        &mut self,
        index: &PageAddressMap,
        mmu: &dyn MmuOps,
        counters: &KmapCounters,
    ) -> usize {
        mmu.flush_cache_kmaps();

        let mut reclaimed = 0usize;
        for slot in 0..self.slots() {
            if self.counts[slot] != 1 {
                continue;
            }
            self.counts[slot] = 0;

            let page = match self.pages[slot].take() {
                Some(page) => page,
                None => crate::kbug!("(Pkmap) janela com count 1 sem página, slot=", slot),
            };
            mmu.set_pte(self.slot_addr(slot), None);
            index.clear(page.pfn());
            reclaimed += 1;
        }

        if reclaimed > 0 {
            mmu.flush_tlb_range(self.base, self.end());
            KmapCounters::inc(&counters.tlb_range_flushes);
        }
        KmapCounters::inc(&counters.reclaims);
        counters
            .reclaimed_slots
            .fetch_add(reclaimed as u64, core::sync::atomic::Ordering::Relaxed);

        crate::kdebug!("(Pkmap) Reclaim, janelas liberadas=", reclaimed);
        reclaimed
    }

    /// Janelas com página
    pub fn bound_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    /// Janelas livres
    pub fn free_count(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }

    /// Verifica `count == 0 ⇔ página ausente` e a correspondência com o
    /// índice. Retorna o primeiro slot inconsistente.
    pub fn find_inconsistency(&self, index: &PageAddressMap) -> Option<usize> {
        for slot in 0..self.slots() {
            match (self.counts[slot], self.pages[slot]) {
                (0, None) => {}
                (0, Some(_)) | (_, None) => return Some(slot),
                (_, Some(page)) => {
                    if index.lookup(page.pfn()) != Some(self.slot_addr(slot)) {
                        return Some(slot);
                    }
                }
            }
        }
        None
    }
}
