//! # HighMem - Mapeamento de memória alta
//!
//! Ponto único de entrada para tocar qualquer frame físico:
//!
//! ```text
//! kmap(page)
//!   ├─ página baixa ─────────────▶ endereço linear (direct map)
//!   └─ página alta ── kmap_lock ─┬▶ PageAddressMap: já tem janela?
//!                                └▶ PkmapTable: janela livre / reclaim
//!                                     └─ esgotado: WaitQueue e recomeça
//! ```
//!
//! ## Regras
//!
//! - `kmap()` pode dormir: nunca chamar de contexto atômico (`might_sleep`).
//! - `kunmap()` sem `kmap()` correspondente é fatal.
//! - Tabela e índice só mudam juntos, com `kmap_lock` segurado.
//! - Ordem de lock: kmap_lock → bucket do índice → free list do índice.
//! - Contexto atômico usa `kmap_atomic()` (janela por CPU, não bloqueia).

pub mod atomic;
pub mod page_address;
pub mod pkmap;
pub mod stats;

pub use atomic::{AtomicMapping, KmType, KM_TYPE_NR};
pub use page_address::PageAddressMap;
pub use pkmap::PkmapTable;
pub use stats::KmapStats;

use crate::arch::context::{might_sleep, preempt_disable};
use crate::arch::MmuOps;
use crate::mm::addr::VirtAddr;
use crate::mm::config::HighmemConfig;
use crate::mm::error::MmResult;
use crate::mm::page::Page;
use crate::mm::pmm::MemoryLayout;
use crate::sync::{Parker, Spinlock, WaitQueue};
use alloc::sync::Arc;
use atomic::AtomicKmaps;
use stats::KmapCounters;

/// Subsistema de janelas kmap.
pub struct HighMem {
    config: HighmemConfig,
    layout: MemoryLayout,
    mmu: Arc<dyn MmuOps>,
    /// kmap_lock: protege a tabela E as mudanças do índice
    table: Spinlock<PkmapTable>,
    index: PageAddressMap,
    /// Quem espera por janela livre
    pkmap_wait: WaitQueue,
    atomic: AtomicKmaps,
    counters: KmapCounters,
}

impl HighMem {
    /// Cria o subsistema com o parker padrão (spin).
    pub fn new(
        config: HighmemConfig,
        layout: MemoryLayout,
        mmu: Arc<dyn MmuOps>,
    ) -> MmResult<Self> {
        Self::with_parker(config, layout, mmu, &crate::sync::waitqueue::SPIN_PARKER)
    }

    /// Cria o subsistema integrando a espera com o scheduler.
    pub fn with_parker(
        config: HighmemConfig,
        layout: MemoryLayout,
        mmu: Arc<dyn MmuOps>,
        parker: &'static dyn Parker,
    ) -> MmResult<Self> {
        if let Err(e) = config.validate() {
            crate::kerror!("(HighMem) Configuração inválida");
            return Err(e);
        }

        crate::kinfo!("(HighMem) Janelas kmap=", config.pkmap_slots);
        crate::kinfo!("(HighMem) PKMAP_BASE=", config.pkmap_base.as_u64());
        crate::kdebug!("(HighMem) max_low_pfn=", layout.max_low_pfn.as_u64());
        crate::kdebug!("(HighMem) max_pfn=", layout.max_pfn.as_u64());

        Ok(Self {
            table: Spinlock::new(PkmapTable::new(config.pkmap_slots, config.pkmap_base)),
            index: PageAddressMap::new(config.pkmap_slots, config.hash_order),
            pkmap_wait: WaitQueue::with_parker(config.wait_spin_limit, parker),
            atomic: AtomicKmaps::new(config.fixmap_base, config.max_cpus),
            counters: KmapCounters::default(),
            config,
            layout,
            mmu,
        })
    }

    #[inline]
    pub fn config(&self) -> &HighmemConfig {
        &self.config
    }

    #[inline]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    #[inline]
    pub fn mmu(&self) -> &dyn MmuOps {
        &*self.mmu
    }

    // =========================================================================
    // KMAP PERSISTENTE
    // =========================================================================

    /// Torna a página acessível e devolve seu endereço virtual.
    ///
    /// Pode dormir esperando uma janela livre.
    pub fn kmap(&self, page: Page) -> VirtAddr {
        might_sleep();
        if !page.is_highmem() {
            KmapCounters::inc(&self.counters.lowmem_hits);
            return self.mmu.linear_address(page.pfn());
        }
        self.kmap_high(page)
    }

    fn kmap_high(&self, page: Page) -> VirtAddr {
        loop {
            let mut table = self.table.lock();
            if let Some(vaddr) = table.acquire(page, &self.index, &*self.mmu, &self.counters) {
                table.pin(vaddr);
                KmapCounters::inc(&self.counters.kmaps);
                return vaddr;
            }

            // Registrar antes de soltar o lock: um kunmap no meio não se perde
            let ticket = self.pkmap_wait.prepare_to_wait();
            drop(table);

            KmapCounters::inc(&self.counters.waits);
            crate::ktrace!("(HighMem) Esperando janela livre, pfn=", page.pfn().as_u64());
            self.pkmap_wait.wait(ticket);
            // Recomeça pelo índice: outro holder pode ter mapeado a página
        }
    }

    /// Desfaz um `kmap()` da página.
    pub fn kunmap(&self, page: Page) {
        if !page.is_highmem() {
            return;
        }

        let need_wakeup = {
            let mut table = self.table.lock();
            let vaddr = match self.index.lookup(page.pfn()) {
                Some(vaddr) => vaddr,
                None => crate::kbug!("(HighMem) kunmap sem kmap, pfn=", page.pfn().as_u64()),
            };
            let slot = match table.slot_of(vaddr) {
                Some(slot) => slot,
                None => crate::kbug!(
                    "(HighMem) índice aponta fora da região kmap=",
                    vaddr.as_u64()
                ),
            };
            table.release(slot)
        };

        KmapCounters::inc(&self.counters.kunmaps);
        if need_wakeup {
            self.pkmap_wait.wake_one();
        }
    }

    /// Endereço virtual atual da página (`None` para página alta sem janela).
    pub fn page_address(&self, page: Page) -> Option<VirtAddr> {
        if !page.is_highmem() {
            return Some(self.mmu.linear_address(page.pfn()));
        }
        self.index.lookup(page.pfn())
    }

    /// Página ligada a um endereço da região kmap.
    pub fn kmap_to_page(&self, vaddr: VirtAddr) -> Option<Page> {
        let table = self.table.lock();
        let slot = table.slot_of(vaddr)?;
        table.page_at(slot)
    }

    /// Força um reclaim das janelas ociosas. Retorna quantas foram liberadas.
    pub fn kmap_flush_unused(&self) -> usize {
        let mut table = self.table.lock();
        table.flush_all_zero_pkmaps(&self.index, &*self.mmu, &self.counters)
    }

    // =========================================================================
    // KMAP ATÔMICO
    // =========================================================================

    /// Mapeia a página na janela (CPU atual, `km`) sem bloquear.
    ///
    /// Preempção fica desabilitada até o drop do `AtomicMapping`.
    pub fn kmap_atomic(&self, page: Page, km: KmType) -> AtomicMapping<'_> {
        preempt_disable();
        if !page.is_highmem() {
            return AtomicMapping::linear(self.mmu.linear_address(page.pfn()));
        }
        KmapCounters::inc(&self.counters.atomic_maps);
        self.atomic.map(&*self.mmu, page, km)
    }

    // =========================================================================
    // DIAGNÓSTICO
    // =========================================================================

    pub fn stats(&self) -> KmapStats {
        let table = self.table.lock();
        self.counters
            .snapshot(table.bound_count() as u64, table.free_count() as u64)
    }

    /// Holders ativos da janela da página (0 se não mapeada)
    pub fn holders(&self, page: Page) -> u32 {
        let table = self.table.lock();
        self.index
            .lookup(page.pfn())
            .and_then(|vaddr| table.slot_of(vaddr))
            .map(|slot| table.count(slot).saturating_sub(1))
            .unwrap_or(0)
    }

    /// Há contextos esperando janela livre?
    pub fn has_waiters(&self) -> bool {
        self.pkmap_wait.has_waiters()
    }

    /// Valida tabela × índice. Loga e retorna `false` na primeira falha.
    pub fn check_invariants(&self) -> bool {
        let table = self.table.lock();

        let bound = table.bound_count();
        if bound != self.index.len() {
            crate::kerror!("(HighMem) Janelas ligadas=", bound);
            crate::kerror!("(HighMem) Entradas no índice=", self.index.len());
            return false;
        }
        if self.index.len() + self.index.free_count() != self.index.capacity() {
            crate::kerror!("(HighMem) Nós perdidos no índice, livres=", self.index.free_count());
            return false;
        }
        if let Some(slot) = table.find_inconsistency(&self.index) {
            crate::kerror!("(HighMem) Janela inconsistente, slot=", slot);
            return false;
        }
        for (pfn, vaddr) in self.index.entries() {
            let owner = table.slot_of(vaddr).and_then(|slot| table.page_at(slot));
            if owner.map(|p| p.pfn()) != Some(pfn) {
                crate::kerror!("(HighMem) Entrada órfã no índice, pfn=", pfn.as_u64());
                return false;
            }
        }
        true
    }
}
