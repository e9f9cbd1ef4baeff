//! # Bounce - Reescrita de I/O para dispositivos limitados
//!
//! Dispositivo que não alcança um frame recebe, no lugar dele, uma página
//! sombra que alcança. Os dados atravessam a fronteira por cópia:
//!
//! ```text
//!            submissão                          completion (IRQ)
//! WRITE  original ──kmap──▶ sombra ──▶ disp.   libera sombras, end_io original
//! READ   (nada)            sombra ──▶ disp.   sombra ──kmap_atomic──▶ original,
//!                                              libera sombras, end_io original
//! ```
//!
//! ## Pools
//!
//! | Pool   | Zona   | Criado                                       |
//! |--------|--------|----------------------------------------------|
//! | geral  | Normal | no init, só se existir highmem               |
//! | ISA    | DMA    | na primeira fila com teto abaixo do direct map |
//!
//! A escolha do pool depende só dos limites da fila (teto e classe) e é
//! feita uma vez por bio. Alocar sombra pode dormir (submissão); a completion nunca bloqueia.

pub mod pool;
pub mod stats;

pub use pool::ShadowPool;
pub use stats::BounceStats;

use crate::arch::context::{local_irq_restore, local_irq_save};
use crate::drivers::block::{
    Bio, BioFlags, BioStatus, BioVec, BlockError, BlockQueue, DmaClass, QueueLimits,
};
use crate::mm::addr::{phys_to_pfn, Pfn, PhysAddr};
use crate::mm::error::MmResult;
use crate::mm::highmem::{HighMem, KmType};
use crate::mm::page::Page;
use crate::mm::pmm::{FrameSource, ZoneType};
use crate::sync::Parker;
use alloc::boxed::Box;
use alloc::sync::Arc;
use spin::Once;
use stats::BounceCounters;

/// Resultado de `decide`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceDecision {
    /// Todo segmento é alcançável: bio segue intacto
    Passthrough,
    /// Pelo menos um segmento precisa de sombra
    Bounce,
}

pub struct Bouncer {
    highmem: Arc<HighMem>,
    frames: Arc<dyn FrameSource>,
    parker: &'static dyn Parker,
    page_pool: Option<Arc<ShadowPool>>,
    isa_pool: Once<Arc<ShadowPool>>,
    counters: Arc<BounceCounters>,
}

impl Bouncer {
    pub fn new(highmem: Arc<HighMem>, frames: Arc<dyn FrameSource>) -> MmResult<Self> {
        Self::with_parker(highmem, frames, &crate::sync::waitqueue::SPIN_PARKER)
    }

    pub fn with_parker(
        highmem: Arc<HighMem>,
        frames: Arc<dyn FrameSource>,
        parker: &'static dyn Parker,
    ) -> MmResult<Self> {
        let config = *highmem.config();

        let page_pool = if highmem.layout().has_highmem() {
            let pool = ShadowPool::new(
                "bounce",
                ZoneType::Normal,
                config.pool_size,
                frames.clone(),
                config.wait_spin_limit,
                parker,
            )?;
            crate::kinfo!("(Bounce) Pool geral, páginas=", config.pool_size);
            Some(Arc::new(pool))
        } else {
            crate::kinfo!("(Bounce) Sem highmem: pool geral não criado");
            None
        };

        Ok(Self {
            highmem,
            frames,
            parker,
            page_pool,
            isa_pool: Once::new(),
            counters: Arc::new(BounceCounters::default()),
        })
    }

    #[inline]
    pub fn highmem(&self) -> &Arc<HighMem> {
        &self.highmem
    }

    pub fn page_pool(&self) -> Option<&Arc<ShadowPool>> {
        self.page_pool.as_ref()
    }

    pub fn isa_pool(&self) -> Option<&Arc<ShadowPool>> {
        self.isa_pool.get()
    }

    /// Cria o pool ISA (idempotente).
    pub fn init_isa_pool(&self) -> MmResult<&Arc<ShadowPool>> {
        let config = *self.highmem.config();
        self.isa_pool.try_call_once(|| {
            let pool = ShadowPool::new(
                "isa",
                ZoneType::Dma,
                config.isa_pool_size,
                self.frames.clone(),
                config.wait_spin_limit,
                self.parker,
            )?;
            crate::kinfo!("(Bounce) Pool ISA, páginas=", config.isa_pool_size);
            Ok(Arc::new(pool))
        })
    }

    /// Configura os limites da fila a partir do maior endereço de DMA.
    ///
    /// Dispositivo que não alcança todo o direct map vira ISA DMA e passa a
    /// usar o pool ISA.
    pub fn set_bounce_limit(&self, limits: &mut QueueLimits, dma_addr: u64) -> MmResult<()> {
        let last = phys_to_pfn(PhysAddr::new(dma_addr));
        let ceiling = Pfn::new(last.as_u64().saturating_add(1));

        if ceiling < self.highmem.layout().max_low_pfn {
            self.init_isa_pool()?;
            limits.dma_class = DmaClass::ISA_DMA;
        } else {
            limits.dma_class = DmaClass::empty();
        }
        limits.bounce_pfn = ceiling;

        crate::kdebug!("(Bounce) Limite da fila, bounce_pfn=", ceiling.as_u64());
        Ok(())
    }

    /// O bio precisa de sombras para esta fila?
    pub fn decide(&self, bio: &Bio, limits: &QueueLimits) -> BounceDecision {
        // Teto acima de toda a RAM: nada a checar por segmento
        if limits.bounce_pfn >= self.highmem.layout().max_pfn {
            return BounceDecision::Passthrough;
        }
        if bio.vecs().iter().any(|v| v.page.pfn() >= limits.bounce_pfn) {
            BounceDecision::Bounce
        } else {
            BounceDecision::Passthrough
        }
    }

    /// Pool da fila: ISA se a classe pede ou se o teto não cobre o direct
    /// map (sombra Normal ainda cairia acima do teto).
    fn select_pool(&self, limits: &QueueLimits) -> &Arc<ShadowPool> {
        let isa = limits.dma_class.contains(DmaClass::ISA_DMA)
            || limits.bounce_pfn < self.highmem.layout().max_low_pfn;

        if isa {
            match self.init_isa_pool() {
                Ok(pool) => pool,
                Err(_) => crate::kbug!(
                    "(Bounce) sem pool ISA para a fila, teto=",
                    limits.bounce_pfn.as_u64()
                ),
            }
        } else {
            match &self.page_pool {
                Some(pool) => pool,
                None => crate::kbug!(
                    "(Bounce) bounce sem pool geral, teto=",
                    limits.bounce_pfn.as_u64()
                ),
            }
        }
    }

    /// Ponto de entrada na submissão: devolve o bio a entregar ao driver.
    pub fn blk_queue_bounce(&self, bio: Bio, limits: &QueueLimits) -> Bio {
        match self.decide(&bio, limits) {
            BounceDecision::Passthrough => {
                BounceCounters::add(&self.counters.passthrough, 1);
                bio
            }
            BounceDecision::Bounce => {
                let pool = Arc::clone(self.select_pool(limits));
                self.build(bio, &pool, limits.bounce_pfn)
            }
        }
    }

    /// Aplica o bounce e entrega à fila.
    pub fn submit(&self, queue: &dyn BlockQueue, bio: Bio) {
        let bio = self.blk_queue_bounce(bio, queue.limits());
        queue.submit_bio(bio);
    }

    /// Monta o bio com sombras para todo segmento em frame ≥ `ceiling`.
    ///
    /// Pode dormir esperando página sombra.
    pub fn build(&self, orig: Bio, pool: &Arc<ShadowPool>, ceiling: Pfn) -> Bio {
        let mut shadow = Bio::new(orig.direction(), orig.sector);
        shadow.flags = BioFlags::BOUNCED;

        let pool_counter = if pool.zone() == ZoneType::Dma {
            &self.counters.isa_pages
        } else {
            &self.counters.general_pages
        };

        let mut bounced = 0u64;
        for vec in orig.vecs() {
            if vec.page.pfn() < ceiling {
                shadow.push(*vec);
                continue;
            }

            let page = pool.alloc();
            BounceCounters::add(pool_counter, 1);
            if orig.is_write() {
                self.copy_to_shadow(vec, page);
            }
            shadow.push(BioVec {
                page,
                len: vec.len,
                offset: vec.offset,
            });
            bounced += 1;
        }

        BounceCounters::add(&self.counters.bounced_bios, 1);
        BounceCounters::add(&self.counters.bounced_segments, bounced);
        crate::ktrace!("(Bounce) Bio reescrito, segmentos=", bounced);

        let completion = BounceCompletion {
            orig,
            pool: Arc::clone(pool),
            highmem: Arc::clone(&self.highmem),
            counters: Arc::clone(&self.counters),
        };
        shadow.set_end_io(Box::new(move |shadow: Bio, bytes: usize, status: BioStatus| {
            completion.finish(shadow, bytes, status)
        }));
        shadow
    }

    fn copy_to_shadow(&self, from: &BioVec, to: Page) {
        let mmu = self.highmem.mmu();
        mmu.flush_dcache_page(from.page);

        let vfrom = self.highmem.kmap(from.page);
        let vto = self.highmem.kmap(to);
        // SAFETY: ambas as páginas estão mapeadas e o segmento cabe na página
        unsafe {
            mmu.copy(
                vto.add(from.offset as u64),
                vfrom.add(from.offset as u64),
                from.len,
            )
        };
        self.highmem.kunmap(to);
        self.highmem.kunmap(from.page);

        BounceCounters::add(&self.counters.bytes_copied_write, from.len as u64);
    }

    pub fn stats(&self) -> BounceStats {
        self.counters.snapshot()
    }

    /// Devolve ao alocador as sombras livres de todos os pools.
    pub fn drain(&self) -> usize {
        let general = self.page_pool.as_ref().map_or(0, |p| p.drain());
        let isa = self.isa_pool.get().map_or(0, |p| p.drain());
        general + isa
    }
}

/// Estado capturado pela completion do bio reescrito.
struct BounceCompletion {
    orig: Bio,
    pool: Arc<ShadowPool>,
    highmem: Arc<HighMem>,
    counters: Arc<BounceCounters>,
}

impl BounceCompletion {
    /// Roda no contexto de completion do driver: não pode bloquear.
    fn finish(self, shadow: Bio, bytes: usize, status: BioStatus) {
        BounceCounters::add(&self.counters.completions, 1);

        if !self.orig.is_write() && status.is_ok() && shadow.flags.contains(BioFlags::UPTODATE) {
            self.copy_back(&shadow);
        }

        let Self {
            mut orig,
            pool,
            counters,
            ..
        } = self;

        // Propagado antes de liberar qualquer segmento
        if shadow.flags.contains(BioFlags::EOPNOTSUPP) || status == Err(BlockError::NotSupported) {
            orig.flags.insert(BioFlags::EOPNOTSUPP);
            BounceCounters::add(&counters.not_supported, 1);
        }

        for (s, o) in shadow.vecs().iter().zip(orig.vecs()) {
            if s.page != o.page {
                pool.free(s.page);
            }
        }

        orig.complete(bytes, status);
    }

    /// Sombra → original para cada segmento substituído (read).
    fn copy_back(&self, shadow: &Bio) {
        let mmu = self.highmem.mmu();

        for (s, o) in shadow.vecs().iter().zip(self.orig.vecs()) {
            if s.page == o.page {
                continue;
            }
            let vfrom = match self.highmem.page_address(s.page) {
                Some(vaddr) => vaddr,
                None => crate::kbug!(
                    "(Bounce) página sombra fora do direct map, pfn=",
                    s.page.pfn().as_u64()
                ),
            };
            mmu.flush_dcache_page(o.page);

            let flags = local_irq_save();
            {
                let vto = self.highmem.kmap_atomic(o.page, KmType::BounceRead);
                // SAFETY: janela atômica ativa e sombra no direct map
                unsafe {
                    mmu.copy(
                        vto.vaddr().add(o.offset as u64),
                        vfrom.add(o.offset as u64),
                        o.len,
                    )
                };
            }
            local_irq_restore(flags);

            BounceCounters::add(&self.counters.bytes_copied_read, o.len as u64);
        }
    }
}
