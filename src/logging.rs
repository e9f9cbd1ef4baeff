// =============================================================================
// KERNEL LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do subsistema HighMem com custo ZERO em release.
//
// ARQUITETURA:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - apenas strings literais e valores hex
// - SEM alocação
// - Escreve no sink instalado pelo kernel (serial, ring buffer, ...)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// COMO USAR:
//   kinfo!("(Pkmap) Inicializando...");        // Apenas string
//   kinfo!("(Pkmap) Slots=", 1024);            // String + hex
//
// =============================================================================

use spin::Once;

// =============================================================================
// SINK
// =============================================================================

/// Destino das mensagens de log.
///
/// O kernel instala a implementação (tipicamente a serial COM1) uma única vez.
pub trait LogSink: Sync {
    fn write_str(&self, s: &str);
}

static SINK: Once<&'static dyn LogSink> = Once::new();

/// Instala o sink de log. Chamadas posteriores são ignoradas.
pub fn install_sink(sink: &'static dyn LogSink) {
    SINK.call_once(|| sink);
}

#[inline]
pub fn emit_str(s: &str) {
    if let Some(sink) = SINK.get() {
        sink.write_str(s);
    }
}

#[inline]
pub fn emit_nl() {
    emit_str("\n");
}

/// Emite valor em hexadecimal (`0x...`) sem usar core::fmt.
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 18];
    buf[0] = b'0';
    buf[1] = b'x';

    let mut i = 0;
    while i < 16 {
        let nibble = ((value >> ((15 - i) * 4)) & 0xF) as u8;
        buf[2 + i] = nibble_to_ascii(nibble);
        i += 1;
    }

    // SAFETY: só dígitos hex ASCII
    emit_str(unsafe { core::str::from_utf8_unchecked(&buf) });
}

#[inline]
const fn nibble_to_ascii(n: u8) -> u8 {
    if n < 10 {
        b'0' + n
    } else {
        b'A' + (n - 10)
    }
}

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

#[doc(hidden)]
#[macro_export]
macro_rules! __klog_line {
    ($prefix:expr, $msg:expr) => {{
        $crate::logging::emit_str($prefix);
        $crate::logging::emit_str($msg);
        $crate::logging::emit_nl();
    }};
    ($prefix:expr, $msg:expr, $val:expr) => {{
        $crate::logging::emit_str($prefix);
        $crate::logging::emit_str($msg);
        $crate::logging::emit_hex($val as u64);
        $crate::logging::emit_nl();
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR / WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)+) => { $crate::__klog_line!($crate::logging::P_ERROR, $($t)+) };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)+) => { $crate::__klog_line!($crate::logging::P_WARN, $($t)+) };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)+) => { $crate::__klog_line!($crate::logging::P_INFO, $($t)+) };
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_info", feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)+) => { $crate::__klog_line!($crate::logging::P_DEBUG, $($t)+) };
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_debug", feature = "log_trace")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)+) => { $crate::__klog_line!($crate::logging::P_TRACE, $($t)+) };
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE STATUS (OK/FAIL)
// =============================================================================

/// kok! - Log de sucesso (prefixo verde [OK]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kok {
    ($msg:expr) => {{
        $crate::logging::emit_str("\x1b[32m[OK]\x1b[0m ");
        $crate::logging::emit_str($msg);
        $crate::logging::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kok {
    ($($t:tt)*) => {{}};
}

/// kfail! - Log de falha (prefixo vermelho [FAIL]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kfail {
    ($msg:expr) => {{
        $crate::logging::emit_str("\x1b[1;31m[FAIL]\x1b[0m ");
        $crate::logging::emit_str($msg);
        $crate::logging::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kfail {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// VIOLAÇÕES FATAIS
// =============================================================================

/// kbug! - Invariante interna quebrada. Loga e para o kernel.
///
/// Não existe caminho de recuperação: indica defeito em outro ponto do
/// sistema (refcount corrompido, kunmap sem kmap, pool/índice dessincronizados).
#[macro_export]
macro_rules! kbug {
    ($msg:expr) => {{
        $crate::kerror!($msg);
        panic!("{}", $msg)
    }};
    ($msg:expr, $val:expr) => {{
        $crate::kerror!($msg, $val);
        panic!("{}{:#x}", $msg, $val as u64)
    }};
}
