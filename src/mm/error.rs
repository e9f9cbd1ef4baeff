//! Tipos de Erro do Subsistema de Memória Alta
//!
//! Erros recuperáveis (configuração, criação de pools, geometria de bio).
//! Invariantes quebradas NÃO passam por aqui: são fatais via `kbug!`.

/// Erros do subsistema de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem memória física disponível (OOM)
    OutOfMemory,
    /// Parâmetro inválido
    InvalidParameter,
    /// Tamanho inválido (zero ou muito grande)
    InvalidSize,
    /// Endereço não alinhado a página
    NotAligned,
    /// Subsistema já inicializado
    AlreadyInitialized,
    /// Segmento de bio ultrapassa o fim da página
    SegmentOutOfRange,
    /// Pool sem páginas livres (apenas nas variantes `try_`)
    PoolExhausted,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem frames físicos disponíveis",
            Self::InvalidParameter => "Parâmetro inválido",
            Self::InvalidSize => "Tamanho inválido",
            Self::NotAligned => "Endereço não alinhado a página",
            Self::AlreadyInitialized => "Subsistema já inicializado",
            Self::SegmentOutOfRange => "Segmento ultrapassa o fim da página",
            Self::PoolExhausted => "Pool de páginas sombra esgotado",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;
