//! Forge HighMem Library.
//!
//! Subsistema de memória alta do Redstone OS: permite que o kernel toque
//! qualquer frame físico mesmo quando o mapa permanente (direct map) é menor
//! que a RAM instalada, e reescreve I/O de bloco para dispositivos que não
//! alcançam todos os frames.
//!
//! ```text
//! kmap(page) ──▶ HighMem ──▶ PageAddressMap (já mapeada?)
//!                   │
//!                   └──────▶ PkmapTable (janela livre / reclaim / espera)
//!
//! submit(bio) ──▶ Bouncer ──▶ ShadowPool + kmap/kmap_atomic (cópias)
//! ```

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (arenas e listas de bio)
extern crate alloc;

// --- Infraestrutura ---
#[macro_use]
pub mod logging; // Macros kinfo!/kerror!/... e sink de saída
pub mod arch; // CPU (IRQ/preempção) e operações de MMU consumidas
pub mod klib; // Framework de testes do kernel
pub mod sync; // Spinlock genérico e WaitQueue

// --- Subsistemas ---
pub mod drivers; // Abstração de bio/fila de bloco
pub mod mm; // HighMem (pkmap, page_address, kmap_atomic) e Bounce

pub use mm::bounce::Bouncer;
pub use mm::highmem::HighMem;
pub use mm::{MmError, MmResult};
