//! # Synchronization Primitives
//!
//! Primitivas de sincronização usadas pelo HighMem.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! Spinlock<T, NoMask>   → estado nunca tocado por IRQ (tabela pkmap)
//! Spinlock<T, IrqSave>  → estado tocado por completion (índice, pools)
//! Spinlock<T, BhMask>   → estado tocado por deferred work
//! WaitQueue             → espera por capacidade (janelas, páginas sombra)
//! ```
//!
//! ## Regras
//!
//! - **Spinlock**: nunca dormir segurando (preempção desabilitada)
//! - **WaitQueue**: registrar com o lock segurado, esperar sem ele
//! - **Ordem de Lock**: kmap_lock → bucket do índice → free list do índice

pub mod spinlock;
pub mod waitqueue;

pub use spinlock::{
    BhMask, BhSpinlock, IrqSave, IrqSpinlock, MaskPolicy, NoMask, Spinlock, SpinlockGuard,
};
pub use waitqueue::{Parker, SpinParker, WaitQueue, WaitTicket};
