// (FIX) src/arch/x86_64/cpu.rs
//! Implementação x86_64 das operações de CPU (HAL).
//!
//! Usa Assembly inline para controle de interrupções e leitura do APIC ID.
//!
//! # Segurança
//! Esta implementação assume que o código está rodando em modo longo (64-bit)
//! e nível de privilégio de kernel (Ring 0).

use crate::arch::context::ExecContext;
use crate::arch::traits::cpu::{CoreId, CpuOps};
use crate::mm::config::MAX_CPUS;
use core::arch::asm;

/// Contexto de execução por núcleo (indexado pelo APIC ID).
static PER_CPU: [ExecContext; MAX_CPUS] = {
    const CTX: ExecContext = ExecContext::new();
    [CTX; MAX_CPUS]
};

pub struct X64Cpu;

impl CpuOps for X64Cpu {
    /// Retorna o ID do núcleo atual.
    ///
    /// Usa CPUID folha 1, bits 24-31 de EBX (Initial APIC ID).
    fn current_id() -> CoreId {
        // O LLVM reserva RBX, então preservamos manualmente.
        let ebx: u32;
        unsafe {
            asm!(
                "push rbx",
                "cpuid",
                "mov {0:e}, ebx",
                "pop rbx",
                out(reg) ebx,
                inout("eax") 1u32 => _,
                out("ecx") _,
                out("edx") _,
                options(nomem, preserves_flags),
            );
        }
        CoreId((ebx >> 24) % MAX_CPUS as u32)
    }

    #[inline]
    fn relax() {
        unsafe {
            asm!("pause", options(nomem, nostack, preserves_flags));
        }
    }

    #[inline]
    unsafe fn disable_interrupts() {
        asm!("cli", options(nomem, nostack, preserves_flags));
    }

    #[inline]
    unsafe fn enable_interrupts() {
        asm!("sti", options(nomem, nostack, preserves_flags));
    }

    /// Verifica se as interrupções estão habilitadas (RFLAGS.IF).
    #[inline]
    fn are_interrupts_enabled() -> bool {
        let rflags: u64;
        unsafe {
            asm!("pushfq; pop {}", out(reg) rflags, options(nomem, preserves_flags));
        }
        // Bit 9 é IF (Interrupt Flag)
        (rflags & (1 << 9)) != 0
    }

    #[inline]
    fn with_context<R>(f: impl FnOnce(&ExecContext) -> R) -> R {
        f(&PER_CPU[Self::current_id().index()])
    }
}
