//! Spinlock - bloqueio com busy-wait
//!
//! Uma única rotina de aquisição (`acquire_with`) parametrizada por:
//! - a operação de try-acquire do lock subjacente;
//! - uma política de mascaramento (`MaskPolicy`) mantida durante o hold.
//!
//! | Política  | Mascara                 | Uso                                   |
//! |-----------|-------------------------|---------------------------------------|
//! | `NoMask`  | nada (só preempção)     | estado nunca tocado por IRQ           |
//! | `IrqSave` | interrupções            | estado tocado por completion de I/O   |
//! | `BhMask`  | deferred work           | estado tocado por softirq/tasklet     |
//!
//! Todo hold incrementa o contador de preempção: dentro de um spinlock o
//! contexto é atômico e `might_sleep()` é violação fatal.

use crate::arch::context::{
    local_bh_disable, local_bh_enable, local_irq_restore, local_irq_save, preempt_disable,
    preempt_enable,
};
use crate::arch::{Cpu, CpuOps};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// POLÍTICAS DE MASCARAMENTO
// =============================================================================

/// O que fica mascarado enquanto o lock está segurado.
pub trait MaskPolicy {
    /// Estado salvo na entrada e restaurado na saída
    type Saved: Copy;

    fn enter() -> Self::Saved;
    fn exit(saved: Self::Saved);
}

/// Apenas preempção desabilitada
pub struct NoMask;

impl MaskPolicy for NoMask {
    type Saved = ();

    #[inline]
    fn enter() {}

    #[inline]
    fn exit(_: ()) {}
}

/// Interrupções mascaradas (estado anterior preservado)
pub struct IrqSave;

impl MaskPolicy for IrqSave {
    type Saved = bool;

    #[inline]
    fn enter() -> bool {
        local_irq_save()
    }

    #[inline]
    fn exit(was_enabled: bool) {
        local_irq_restore(was_enabled);
    }
}

/// Deferred work (bottom halves) mascarado
pub struct BhMask;

impl MaskPolicy for BhMask {
    type Saved = ();

    #[inline]
    fn enter() {
        local_bh_disable();
    }

    #[inline]
    fn exit(_: ()) {
        local_bh_enable();
    }
}

// =============================================================================
// ROTINA GENÉRICA
// =============================================================================

/// Adquire um lock qualquer sob a política `P`.
///
/// Cada tentativa entra na seção mascarada; se falhar, sai dela e espera o
/// lock parecer livre antes de tentar de novo, para não segurar IRQs
/// mascaradas durante o spin.
#[inline]
pub fn acquire_with<P: MaskPolicy>(
    try_acquire: impl Fn() -> bool,
    is_locked: impl Fn() -> bool,
) -> P::Saved {
    loop {
        preempt_disable();
        let saved = P::enter();
        if try_acquire() {
            return saved;
        }
        P::exit(saved);
        preempt_enable();

        while is_locked() {
            Cpu::relax();
        }
    }
}

/// Libera um lock adquirido por `acquire_with`.
#[inline]
pub fn release_with<P: MaskPolicy>(unlock: impl FnOnce(), saved: P::Saved) {
    unlock();
    P::exit(saved);
    preempt_enable();
}

// =============================================================================
// SPINLOCK
// =============================================================================

/// Spinlock - usa busy-wait, NÃO pode dormir
///
/// # Quando usar
///
/// - Seções críticas MUITO curtas
/// - Estado compartilhado com handlers de interrupção (`IrqSave`)
pub struct Spinlock<T, P: MaskPolicy = NoMask> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
    _policy: PhantomData<fn() -> P>,
}

/// Spinlock que mascara interrupções
pub type IrqSpinlock<T> = Spinlock<T, IrqSave>;

/// Spinlock que mascara deferred work
pub type BhSpinlock<T> = Spinlock<T, BhMask>;

// SAFETY: Spinlock protege acesso com lock atômico
unsafe impl<T: Send, P: MaskPolicy> Send for Spinlock<T, P> {}
unsafe impl<T: Send, P: MaskPolicy> Sync for Spinlock<T, P> {}

impl<T, P: MaskPolicy> Spinlock<T, P> {
    /// Cria novo spinlock
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            _policy: PhantomData,
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Adquire o lock
    pub fn lock(&self) -> SpinlockGuard<'_, T, P> {
        let saved = acquire_with::<P>(
            || self.try_acquire(),
            || self.locked.load(Ordering::Relaxed),
        );
        SpinlockGuard { lock: self, saved }
    }

    /// Tenta adquirir sem bloquear
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T, P>> {
        preempt_disable();
        let saved = P::enter();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard { lock: self, saved })
        } else {
            P::exit(saved);
            preempt_enable();
            None
        }
    }

    /// Verifica se está segurado (diagnóstico)
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Acesso exclusivo sem lock (temos `&mut self`)
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// Guard do spinlock - libera ao sair do escopo
pub struct SpinlockGuard<'a, T, P: MaskPolicy = NoMask> {
    lock: &'a Spinlock<T, P>,
    saved: P::Saved,
}

impl<T, P: MaskPolicy> Deref for SpinlockGuard<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, P: MaskPolicy> DerefMut for SpinlockGuard<'_, T, P> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, P: MaskPolicy> Drop for SpinlockGuard<'_, T, P> {
    fn drop(&mut self) {
        let locked = &self.lock.locked;
        release_with::<P>(|| locked.store(false, Ordering::Release), self.saved);
    }
}
