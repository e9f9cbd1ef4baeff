//! # Memory Management - HighMem e Bounce
//!
//! O direct map cobre só os frames abaixo de `max_low_pfn`. Este módulo dá
//! acesso ao resto da RAM e protege dispositivos de DMA limitado.
//!
//! | Módulo     | Responsabilidade                                        |
//! |------------|---------------------------------------------------------|
//! | `highmem`  | Janelas kmap persistentes, índice reverso, kmap_atomic |
//! | `bounce`   | Pools de páginas sombra e reescrita de bio             |
//! | `pmm`      | Contrato do alocador físico e layout de zonas          |
//! | `addr`     | Tipos `Pfn` / `VirtAddr`                                |
//! | `config`   | Constantes e `HighmemConfig`                            |
//!
//! ## Ordem de inicialização
//!
//! ```text
//! HighMem (tabela pkmap + índice + fixmap) ──▶ Bouncer (pool geral)
//!                                                 └─ pool ISA: sob demanda
//! ```
//!
//! O Bouncer copia dados com `kmap`/`kmap_atomic`, então depende do HighMem.
//! `init()` roda uma vez no boot; chamadas repetidas retornam
//! `AlreadyInitialized`.
//!
//! ## Ordem de lock
//!
//! kmap_lock → bucket do índice → free list do índice. Pools de sombra usam
//! lock próprio e nunca são tocados com kmap_lock segurado.

pub mod addr;
pub mod bounce;
pub mod config;
pub mod error;
pub mod highmem;
pub mod page;
pub mod pmm;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use error::{MmError, MmResult};
#[cfg(any(test, feature = "self_test"))]
pub use test::run_highmem_tests;

use crate::arch::MmuOps;
use alloc::sync::Arc;
use bounce::Bouncer;
use config::HighmemConfig;
use highmem::HighMem;
use pmm::{FrameSource, MemoryLayout};
use spin::Once;

static HIGHMEM: Once<Arc<HighMem>> = Once::new();
static BOUNCER: Once<Bouncer> = Once::new();

/// Inicializa HighMem e Bouncer globais.
///
/// `mmu` e `frames` são as implementações do kernel para a arquitetura.
pub fn init(
    config: HighmemConfig,
    layout: MemoryLayout,
    mmu: Arc<dyn MmuOps>,
    frames: Arc<dyn FrameSource>,
) -> MmResult<()> {
    if HIGHMEM.is_completed() {
        crate::kwarn!("(MM) HighMem já inicializado");
        return Err(MmError::AlreadyInitialized);
    }

    crate::kinfo!("(MM) Inicializando HighMem...");
    let highmem = HIGHMEM.try_call_once(|| HighMem::new(config, layout, mmu).map(Arc::new))?;

    crate::kinfo!("(MM) Inicializando Bounce...");
    if let Err(e) = BOUNCER.try_call_once(|| Bouncer::new(Arc::clone(highmem), frames)) {
        crate::kerror!("(MM) Falha ao criar pool de bounce");
        return Err(e);
    }

    crate::kok!("(MM) HighMem pronto");
    Ok(())
}

/// HighMem global (`None` antes do `init`)
pub fn highmem() -> Option<&'static Arc<HighMem>> {
    HIGHMEM.get()
}

/// Bouncer global (`None` antes do `init`)
pub fn bouncer() -> Option<&'static Bouncer> {
    BOUNCER.get()
}
