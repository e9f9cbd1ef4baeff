//! # kmap_atomic - Janelas atômicas por CPU
//!
//! Alternativa não bloqueante ao `kmap()`, usável de IRQ/softirq: cada
//! núcleo tem uma janela fixa por tipo de uso (`KmType`).
//!
//! ```text
//! fixmap_base + (cpu * KM_TYPE_NR + tipo) * PAGE_SIZE
//! ```
//!
//! Regras:
//! - Preempção fica desabilitada enquanto o `AtomicMapping` existir
//! - Não reentrante: usar de novo um (cpu, tipo) ocupado é fatal
//! - No drop: PTE removida e entrada local do TLB invalidada

use crate::arch::context::preempt_enable;
use crate::arch::{Cpu, CpuOps, MmuOps};
use crate::mm::addr::{window_addr, VirtAddr};
use crate::mm::page::Page;
use alloc::boxed::Box;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

/// Tipo de uso de uma janela atômica.
///
/// Cada contexto que pode interromper outro usa um tipo próprio, para que
/// o interrompido não tenha a janela reaproveitada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KmType {
    BounceRead = 0,
    BioSrcIrq,
    BioDstIrq,
    User0,
    User1,
    Irq0,
    Irq1,
    SoftIrq0,
    SoftIrq1,
}

/// Número de tipos (janelas por CPU)
pub const KM_TYPE_NR: usize = 9;

impl KmType {
    #[inline]
    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Janelas atômicas de todos os núcleos.
pub struct AtomicKmaps {
    base: VirtAddr,
    /// Bitmap de tipos em uso, um por CPU
    in_use: Box<[AtomicU32]>,
}

impl AtomicKmaps {
    pub fn new(base: VirtAddr, max_cpus: usize) -> Self {
        Self {
            base,
            in_use: (0..max_cpus).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Endereço da janela (cpu, tipo)
    #[inline]
    pub fn window(&self, cpu: usize, km: KmType) -> VirtAddr {
        window_addr(self.base, cpu * KM_TYPE_NR + km as usize)
    }

    /// Fim (exclusivo) da região fixmap
    #[inline]
    pub fn end(&self) -> VirtAddr {
        window_addr(self.base, self.in_use.len() * KM_TYPE_NR)
    }

    /// Tipos ocupados no núcleo `cpu` (diagnóstico)
    pub fn busy_mask(&self, cpu: usize) -> u32 {
        self.in_use[cpu].load(Ordering::Relaxed)
    }

    /// Mapeia página alta na janela (cpu atual, `km`).
    ///
    /// O caller já desabilitou preempção.
    pub(super) fn map<'a>(
        &'a self,
        mmu: &'a dyn MmuOps,
        page: Page,
        km: KmType,
    ) -> AtomicMapping<'a> {
        let cpu = Cpu::current_id().index();
        if cpu >= self.in_use.len() {
            crate::kbug!("(Kmap) CPU sem janelas atômicas, id=", cpu);
        }

        let prev = self.in_use[cpu].fetch_or(km.bit(), Ordering::Relaxed);
        if prev & km.bit() != 0 {
            crate::kbug!("(Kmap) kmap_atomic reentrante, tipo=", km as u8);
        }

        let vaddr = self.window(cpu, km);
        mmu.set_pte(vaddr, Some(page.pfn()));

        AtomicMapping {
            vaddr,
            slot: Some(AtomicSlot {
                owner: self,
                mmu,
                cpu,
                km,
            }),
            _not_send: PhantomData,
        }
    }
}

struct AtomicSlot<'a> {
    owner: &'a AtomicKmaps,
    mmu: &'a dyn MmuOps,
    cpu: usize,
    km: KmType,
}

/// Mapeamento atômico ativo. Preso ao núcleo que o criou.
pub struct AtomicMapping<'a> {
    vaddr: VirtAddr,
    /// `None` para página baixa (endereço linear, nada a desfazer)
    slot: Option<AtomicSlot<'a>>,
    _not_send: PhantomData<*const ()>,
}

impl<'a> AtomicMapping<'a> {
    /// Mapeamento de página do direct map: só segura a preempção.
    pub(super) fn linear(vaddr: VirtAddr) -> Self {
        Self {
            vaddr,
            slot: None,
            _not_send: PhantomData,
        }
    }

    #[inline]
    pub fn vaddr(&self) -> VirtAddr {
        self.vaddr
    }
}

impl Drop for AtomicMapping<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.mmu.set_pte(self.vaddr, None);
            slot.mmu.flush_tlb_one(self.vaddr);
            slot.owner.in_use[slot.cpu].fetch_and(!slot.km.bit(), Ordering::Relaxed);
        }
        preempt_enable();
    }
}
