//! # ShadowPool - Pool limitado de páginas sombra
//!
//! Frames pré-alocados de uma zona que o dispositivo alcança. O tamanho é
//! o pior caso de segmentos em voo; quando o pool esvazia, `alloc()`
//! espera (nunca falha) e cada `free()` acorda um waiter.
//!
//! `free()` roda na completion de I/O (IRQ): não bloqueia e só usa
//! `IrqSpinlock`.

use crate::arch::context::might_sleep;
use crate::mm::error::{MmError, MmResult};
use crate::mm::page::{Page, PageFlags};
use crate::mm::pmm::{FrameSource, ZoneType};
use crate::sync::{IrqSpinlock, Parker, WaitQueue};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

struct PoolState {
    /// Todos os frames do pool (ordenados por pfn)
    members: Vec<Page>,
    /// `true` = livre, paralelo a `members`
    free_map: Vec<bool>,
    /// Índices livres em `members`
    free: Vec<usize>,
}

impl PoolState {
    fn position(&self, page: Page) -> Option<usize> {
        self.members
            .binary_search_by(|p| p.pfn().cmp(&page.pfn()))
            .ok()
    }
}

pub struct ShadowPool {
    name: &'static str,
    zone: ZoneType,
    state: IrqSpinlock<PoolState>,
    frames: Arc<dyn FrameSource>,
    wait: WaitQueue,
    in_use: AtomicUsize,
    high_water: AtomicUsize,
    waits: AtomicUsize,
}

impl ShadowPool {
    /// Pré-aloca `capacity` frames da zona `zone`.
    ///
    /// Falha parcial devolve o que já foi obtido e retorna `OutOfMemory`.
    pub fn new(
        name: &'static str,
        zone: ZoneType,
        capacity: usize,
        frames: Arc<dyn FrameSource>,
        spin_limit: u32,
        parker: &'static dyn Parker,
    ) -> MmResult<Self> {
        if capacity == 0 {
            return Err(MmError::InvalidSize);
        }

        let mut members = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            match frames.alloc_frame(zone) {
                Some(page) => members.push(page.with_flags(PageFlags::BOUNCE)),
                None => {
                    crate::kerror!("(Pool) Sem frames para o pool, obtidos=", members.len());
                    for page in members {
                        frames.free_frame(page);
                    }
                    return Err(MmError::OutOfMemory);
                }
            }
        }
        members.sort_unstable_by_key(|p| p.pfn());

        crate::kinfo!("(Pool) Pool criado, páginas=", capacity);
        crate::kdebug!(name);

        Ok(Self {
            name,
            zone,
            state: IrqSpinlock::new(PoolState {
                members,
                free_map: alloc::vec![true; capacity],
                free: (0..capacity).rev().collect(),
            }),
            frames,
            wait: WaitQueue::with_parker(spin_limit, parker),
            in_use: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn zone(&self) -> ZoneType {
        self.zone
    }

    /// Tenta pegar uma página sem esperar.
    pub fn try_alloc(&self) -> MmResult<Page> {
        let mut state = self.state.lock();
        match state.free.pop() {
            Some(i) => {
                state.free_map[i] = false;
                let now = self.in_use.fetch_add(1, Ordering::Relaxed) + 1;
                self.high_water.fetch_max(now, Ordering::Relaxed);
                Ok(state.members[i])
            }
            None => Err(MmError::PoolExhausted),
        }
    }

    /// Pega uma página sombra, esperando se o pool estiver vazio.
    pub fn alloc(&self) -> Page {
        might_sleep();
        loop {
            if let Ok(page) = self.try_alloc() {
                return page;
            }

            let state = self.state.lock();
            if !state.free.is_empty() {
                // Alguém devolveu entre o try_alloc e o lock
                continue;
            }
            let ticket = self.wait.prepare_to_wait();
            drop(state);

            self.waits.fetch_add(1, Ordering::Relaxed);
            crate::ktrace!("(Pool) Pool vazio, esperando");
            self.wait.wait(ticket);
        }
    }

    /// Devolve uma página ao pool. Não bloqueia.
    ///
    /// Página que não pertence ao pool ou já livre é fatal.
    pub fn free(&self, page: Page) {
        {
            let mut state = self.state.lock();
            let i = match state.position(page) {
                Some(i) => i,
                None => crate::kbug!("(Pool) página fora do pool, pfn=", page.pfn().as_u64()),
            };
            if state.free_map[i] {
                crate::kbug!("(Pool) double free de página sombra, pfn=", page.pfn().as_u64());
            }
            state.free_map[i] = true;
            state.free.push(i);
            self.in_use.fetch_sub(1, Ordering::Relaxed);
        }
        self.wait.wake_one();
    }

    /// A página é uma das sombras deste pool?
    pub fn contains(&self, page: Page) -> bool {
        self.state.lock().position(page).is_some()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.state.lock().members.len()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.state.lock().free.len()
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::Relaxed)
    }

    /// Devolve ao alocador físico todas as páginas livres.
    ///
    /// Páginas em voo continuam no pool. Retorna quantas foram devolvidas.
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        let mut released = Vec::new();
        for i in 0..state.members.len() {
            if state.free_map[i] {
                released.push(state.members[i]);
            }
        }
        let remaining: Vec<Page> = (0..state.members.len())
            .filter(|&i| !state.free_map[i])
            .map(|i| state.members[i])
            .collect();

        let busy = remaining.len();
        state.members = remaining;
        state.free_map = alloc::vec![false; busy];
        state.free.clear();
        drop(state);

        for page in &released {
            self.frames.free_frame(*page);
        }
        crate::kdebug!("(Pool) Drain, páginas devolvidas=", released.len());
        released.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::test::sim::{self, SimFrames, YIELD_PARKER};
    use std::sync::atomic::AtomicBool;

    fn pool(capacity: usize) -> (Arc<ShadowPool>, Arc<SimFrames>) {
        let frames = Arc::new(SimFrames::new(sim::layout()));
        let pool = ShadowPool::new(
            "teste",
            ZoneType::Normal,
            capacity,
            frames.clone(),
            8,
            &YIELD_PARKER,
        )
        .unwrap();
        (Arc::new(pool), frames)
    }

    #[test]
    fn test_prealloc_from_zone() {
        let (pool, frames) = pool(4);
        assert_eq!(frames.outstanding(), 4);
        let page = pool.alloc();
        assert!(page.flags().contains(PageFlags::BOUNCE));
        assert_eq!(sim::layout().zone_of(page.pfn()), ZoneType::Normal);
        assert_eq!(pool.available(), 3);
        pool.free(page);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.high_water(), 1);
    }

    #[test]
    fn test_creation_oom_returns_frames() {
        let frames = Arc::new(SimFrames::with_limit(sim::layout(), 3));
        let result = ShadowPool::new(
            "oom",
            ZoneType::Dma,
            4,
            frames.clone(),
            8,
            &YIELD_PARKER,
        );
        assert!(matches!(result, Err(MmError::OutOfMemory)));
        assert_eq!(frames.outstanding(), 0);
    }

    #[test]
    fn test_try_alloc_exhausted() {
        let (pool, _frames) = pool(1);
        let page = pool.try_alloc().unwrap();
        assert_eq!(pool.try_alloc(), Err(MmError::PoolExhausted));
        pool.free(page);
        assert!(pool.try_alloc().is_ok());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_is_fatal() {
        let (pool, _frames) = pool(2);
        let page = pool.alloc();
        pool.free(page);
        pool.free(page);
    }

    #[test]
    fn test_alloc_blocks_until_free() {
        let (pool, _frames) = pool(1);
        let held = pool.alloc();
        let done = Arc::new(AtomicBool::new(false));

        let t = {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let page = pool.alloc();
                done.store(true, Ordering::SeqCst);
                pool.free(page);
            })
        };

        while pool.waits() == 0 {
            std::thread::yield_now();
        }
        assert!(!done.load(Ordering::SeqCst));
        pool.free(held);
        t.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_drain_keeps_in_flight_pages() {
        let (pool, frames) = pool(4);
        let busy = pool.alloc();
        assert_eq!(pool.drain(), 3);
        assert_eq!(frames.outstanding(), 1);
        assert!(pool.contains(busy));
        pool.free(busy);
        assert_eq!(pool.available(), 1);
    }
}
