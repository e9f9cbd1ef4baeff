//! Implementação "hosted" das operações de CPU.
//!
//! Usada quando o crate não roda em bare metal (testes no host, ferramentas).
//! Não existe hardware de interrupção: o flag IF é um modelo em software
//! guardado no próprio `ExecContext`.
//!
//! - Em `cfg(test)` cada thread do host é um "núcleo" com contexto próprio.
//! - Fora de testes existe um único contexto global (núcleo 0).

use crate::arch::context::ExecContext;
use crate::arch::traits::cpu::{CoreId, CpuOps};
use core::sync::atomic::Ordering;

pub struct HostedCpu;


#[cfg(not(test))]
static GLOBAL_CTX: ExecContext = ExecContext::new();

/// Fixa o "núcleo" da thread atual (apenas testes).
#[cfg(test)]
pub fn set_current_cpu(id: u32) {
    per_thread::CPU_ID.with(|c| c.set(id));
}

impl CpuOps for HostedCpu {
    #[cfg(test)]
    fn current_id() -> CoreId {
        CoreId(per_thread::CPU_ID.with(|c| c.get()))
    }

    #[cfg(not(test))]
    fn current_id() -> CoreId {
        CoreId(0)
    }

    #[inline]
    fn relax() {
        core::hint::spin_loop();
    }

    unsafe fn disable_interrupts() {
        Self::with_context(|ctx| ctx.irqs_off.store(true, Ordering::Relaxed));
    }

    unsafe fn enable_interrupts() {
        Self::with_context(|ctx| ctx.irqs_off.store(false, Ordering::Relaxed));
    }

    fn are_interrupts_enabled() -> bool {
        Self::with_context(|ctx| !ctx.irqs_off.load(Ordering::Relaxed))
    }

    #[cfg(test)]
    fn with_context<R>(f: impl FnOnce(&ExecContext) -> R) -> R {
        per_thread::CTX.with(|ctx| f(ctx))
    }

    #[cfg(not(test))]
    fn with_context<R>(f: impl FnOnce(&ExecContext) -> R) -> R {
        f(&GLOBAL_CTX)
    }
}
