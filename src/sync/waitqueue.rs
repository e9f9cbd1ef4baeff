//! WaitQueue - espera por capacidade
//!
//! Protocolo usado por quem espera um recurso protegido por spinlock:
//!
//! ```text
//! lock()
//!   recurso esgotado?
//!   ticket = wq.prepare_to_wait()   // registra ANTES de soltar o lock
//! unlock()
//! wq.wait(ticket)                   // spin curto, depois Parker
//! lock() e recomeçar do início
//! ```
//!
//! Cada wake deposita um token; um waiter só volta ao consumir um token.
//! Como o registro acontece com o lock segurado, um release que ocorra
//! entre o `unlock()` e o `wait()` nunca é perdido.
//!
//! Sem ordem FIFO: qualquer waiter registrado pode consumir o token.
//! Quem acorda sempre revalida a condição (despertar espúrio é permitido).

use crate::arch::context::might_sleep;
use crate::arch::{Cpu, CpuOps};
use core::sync::atomic::{AtomicU64, Ordering};

/// Integração com o scheduler: como estacionar o contexto atual.
pub trait Parker: Send + Sync {
    /// Estaciona até um unpark (ou retorno espúrio).
    fn park(&self);
    fn unpark_one(&self);
    fn unpark_all(&self);
}

/// Parker padrão sem scheduler: busy-wait.
pub struct SpinParker;

impl Parker for SpinParker {
    #[inline]
    fn park(&self) {
        Cpu::relax();
    }

    fn unpark_one(&self) {}

    fn unpark_all(&self) {}
}

pub static SPIN_PARKER: SpinParker = SpinParker;

/// Comprovante de registro devolvido por `prepare_to_wait`.
#[must_use = "um waiter registrado precisa chamar wait()"]
pub struct WaitTicket(());

/// Fila de espera com tokens.
///
/// Estado empacotado em um u64: `waiters` nos 32 bits altos, `tokens` nos
/// 32 baixos. Invariante: `tokens <= waiters`.
pub struct WaitQueue {
    state: AtomicU64,
    spin_limit: u32,
    parker: &'static dyn Parker,
}

#[inline]
const fn pack(waiters: u32, tokens: u32) -> u64 {
    ((waiters as u64) << 32) | tokens as u64
}

#[inline]
const fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

impl WaitQueue {
    pub const fn new(spin_limit: u32) -> Self {
        Self::with_parker(spin_limit, &SPIN_PARKER)
    }

    pub const fn with_parker(spin_limit: u32, parker: &'static dyn Parker) -> Self {
        Self {
            state: AtomicU64::new(0),
            spin_limit,
            parker,
        }
    }

    /// Registra o contexto atual como waiter.
    ///
    /// Deve ser chamado com o lock que protege o recurso segurado.
    pub fn prepare_to_wait(&self) -> WaitTicket {
        self.state.fetch_add(pack(1, 0), Ordering::AcqRel);
        WaitTicket(())
    }

    /// Espera até consumir um token de wake.
    ///
    /// Deve ser chamado SEM nenhum spinlock segurado.
    pub fn wait(&self, _ticket: WaitTicket) {
        might_sleep();

        let mut spins = 0u32;
        while !self.try_consume() {
            if spins < self.spin_limit {
                spins += 1;
                Cpu::relax();
            } else {
                self.parker.park();
            }
        }
    }

    fn try_consume(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                let (waiters, tokens) = unpack(s);
                if tokens == 0 {
                    None
                } else {
                    Some(pack(waiters - 1, tokens - 1))
                }
            })
            .is_ok()
    }

    /// Acorda um waiter (se houver algum ainda sem token).
    pub fn wake_one(&self) -> bool {
        let woke = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                let (waiters, tokens) = unpack(s);
                if tokens < waiters {
                    Some(pack(waiters, tokens + 1))
                } else {
                    None
                }
            })
            .is_ok();
        if woke {
            self.parker.unpark_one();
        }
        woke
    }

    /// Acorda todos os waiters registrados.
    pub fn wake_all(&self) {
        let prev = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                let (waiters, tokens) = unpack(s);
                if tokens < waiters {
                    Some(pack(waiters, waiters))
                } else {
                    None
                }
            });
        if prev.is_ok() {
            self.parker.unpark_all();
        }
    }

    /// Existe alguém esperando sem token?
    pub fn has_waiters(&self) -> bool {
        let (waiters, tokens) = unpack(self.state.load(Ordering::Acquire));
        waiters > tokens
    }

    /// Waiters registrados (diagnóstico/testes)
    pub fn waiters(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).0
    }
}
