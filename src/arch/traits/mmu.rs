//! Operações de MMU consumidas pelo subsistema HighMem.
//!
//! A codificação de page tables não pertence a este crate: o kernel
//! fornece a implementação (instalar/remover PTE, invalidar TLB, flush de
//! cache) e o HighMem decide QUANDO cada operação acontece.
//!
//! ```text
//! HighMem ──▶ set_pte / clear ──▶ page tables do kernel
//!    │
//!    └─────▶ flush_tlb_range (1x por reclaim, cobre todas as janelas)
//! ```

use crate::mm::addr::{Pfn, VirtAddr};
use crate::mm::config::PAGE_SIZE;
use crate::mm::page::Page;

pub trait MmuOps: Send + Sync {
    /// Instala (`Some`) ou remove (`None`) a PTE de uma janela do kernel.
    fn set_pte(&self, vaddr: VirtAddr, pfn: Option<Pfn>);

    /// Invalida uma única entrada do TLB local.
    fn flush_tlb_one(&self, vaddr: VirtAddr);

    /// Invalida o intervalo `[start, end)` em todos os núcleos.
    fn flush_tlb_range(&self, start: VirtAddr, end: VirtAddr);

    /// Flush do data cache de uma página (no-op em x86).
    fn flush_dcache_page(&self, _page: Page) {}

    /// Flush do data cache de todas as janelas kmap antes de um reclaim.
    fn flush_cache_kmaps(&self) {}

    /// Endereço no mapa permanente (direct map) de um frame baixo.
    fn linear_address(&self, pfn: Pfn) -> VirtAddr;

    /// Copia `len` bytes entre dois endereços virtuais do kernel.
    ///
    /// # Safety
    /// Ambos os intervalos devem estar mapeados e não sobrepostos.
    unsafe fn copy(&self, dst: VirtAddr, src: VirtAddr, len: usize) {
        debug_assert!(len <= PAGE_SIZE);
        core::ptr::copy_nonoverlapping(src.as_ptr::<u8>(), dst.as_mut_ptr::<u8>(), len);
    }
}
