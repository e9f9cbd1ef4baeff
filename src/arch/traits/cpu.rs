//! Interface Abstrata de CPU (HAL).
//! Define as operações que qualquer arquitetura (x86, ARM, RISC-V) deve implementar.

use crate::arch::context::ExecContext;

/// Identificador de núcleo (APIC ID no x86_64).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreId(pub u32);

impl CoreId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

pub trait CpuOps {
    /// Retorna o ID do núcleo atual.
    fn current_id() -> CoreId;

    /// Dica para a CPU que estamos em um spinloop (PAUSE).
    fn relax();

    /// Desabilita interrupções globalmente (CLI).
    ///
    /// # Safety
    /// O caller deve restaurar o estado anterior.
    unsafe fn disable_interrupts();

    /// Habilita interrupções globalmente (STI).
    ///
    /// # Safety
    /// Não pode ser chamado dentro de uma seção que exige IRQs mascaradas.
    unsafe fn enable_interrupts();

    /// Verifica se as interrupções estão habilitadas.
    fn are_interrupts_enabled() -> bool;

    /// Executa `f` com o contexto de execução corrente (contadores de
    /// preempção e de deferred work do núcleo atual).
    fn with_context<R>(f: impl FnOnce(&ExecContext) -> R) -> R;
}
