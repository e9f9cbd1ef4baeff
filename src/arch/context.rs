//! # Contexto de Execução
//!
//! Contadores por núcleo que dizem se o código atual PODE dormir:
//!
//! | Contador          | Incrementado por                         |
//! |-------------------|------------------------------------------|
//! | `preempt_count`   | todo spinlock segurado, kmap_atomic      |
//! | `bh_count`        | seções com deferred work mascarado       |
//! | IF (RFLAGS)       | seções com IRQ mascarada                 |
//!
//! `might_sleep()` é a guarda usada por `kmap()`: chamar uma operação que
//! bloqueia a partir de um contexto atômico é violação fatal.

use crate::arch::{Cpu, CpuOps};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Estado de execução de um núcleo.
pub struct ExecContext {
    preempt_count: AtomicU32,
    bh_count: AtomicU32,
    /// Modelo de IF em software (apenas builds hosted)
    pub(crate) irqs_off: AtomicBool,
}

impl ExecContext {
    pub const fn new() -> Self {
        Self {
            preempt_count: AtomicU32::new(0),
            bh_count: AtomicU32::new(0),
            irqs_off: AtomicBool::new(false),
        }
    }
}

// =============================================================================
// PREEMPÇÃO
// =============================================================================

#[inline]
pub fn preempt_disable() {
    Cpu::with_context(|ctx| ctx.preempt_count.fetch_add(1, Ordering::Relaxed));
}

#[inline]
pub fn preempt_enable() {
    let prev = Cpu::with_context(|ctx| ctx.preempt_count.fetch_sub(1, Ordering::Relaxed));
    if prev == 0 {
        crate::kbug!("(Cpu) preempt_enable sem preempt_disable");
    }
}

#[inline]
pub fn preempt_count() -> u32 {
    Cpu::with_context(|ctx| ctx.preempt_count.load(Ordering::Relaxed))
}

// =============================================================================
// DEFERRED WORK (bottom halves)
// =============================================================================

#[inline]
pub fn local_bh_disable() {
    Cpu::with_context(|ctx| ctx.bh_count.fetch_add(1, Ordering::Relaxed));
}

#[inline]
pub fn local_bh_enable() {
    let prev = Cpu::with_context(|ctx| ctx.bh_count.fetch_sub(1, Ordering::Relaxed));
    if prev == 0 {
        crate::kbug!("(Cpu) local_bh_enable sem local_bh_disable");
    }
}

#[inline]
pub fn in_softirq() -> bool {
    Cpu::with_context(|ctx| ctx.bh_count.load(Ordering::Relaxed) != 0)
}

// =============================================================================
// INTERRUPÇÕES
// =============================================================================

/// Mascara IRQs e devolve o estado anterior.
#[inline]
pub fn local_irq_save() -> bool {
    let was_enabled = Cpu::are_interrupts_enabled();
    // SAFETY: estado anterior devolvido ao caller para restore
    unsafe { Cpu::disable_interrupts() };
    was_enabled
}

/// Restaura o estado salvo por `local_irq_save`.
#[inline]
pub fn local_irq_restore(was_enabled: bool) {
    if was_enabled {
        // SAFETY: IRQs estavam habilitadas antes do save correspondente
        unsafe { Cpu::enable_interrupts() };
    }
}

#[inline]
pub fn irqs_disabled() -> bool {
    !Cpu::are_interrupts_enabled()
}

// =============================================================================
// GUARDAS
// =============================================================================

/// Verdadeiro quando o contexto atual não pode bloquear.
pub fn in_atomic() -> bool {
    preempt_count() != 0 || in_softirq() || irqs_disabled()
}

/// Violação fatal se o contexto atual não puder dormir.
#[inline]
pub fn might_sleep() {
    if in_atomic() {
        crate::kbug!(
            "(Cpu) operação bloqueante em contexto atômico, preempt=",
            preempt_count()
        );
    }
}
