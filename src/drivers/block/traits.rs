//! # Camada de Abstração de Filas de Bloco
//!
//! Contrato entre quem submete I/O e o driver que o executa.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              FILESYSTEM / PAGE CACHE                │
//! └─────────────────────────────────────────────────────┘
//!                          ↓ Bio
//! ┌─────────────────────────────────────────────────────┐
//! │              Bouncer (páginas sombra)               │
//! └─────────────────────────────────────────────────────┘
//!                          ↓ Bio (talvez reescrito)
//! ┌─────────────────────────────────────────────────────┐
//! │              BlockQueue Trait                       │
//! │   limits()  submit_bio()  → bio.complete(...)       │
//! └─────────────────────────────────────────────────────┘
//! ```

use super::bio::{Bio, QueueLimits};
use core::fmt;

/// Tipos de erro para dispositivos de bloco
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// Erro de I/O durante leitura/escrita
    IoError,
    /// Operação não suportada pelo dispositivo (ex: barrier)
    NotSupported,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::IoError => write!(f, "Erro de I/O"),
            BlockError::NotSupported => write!(f, "Operação não suportada"),
        }
    }
}

/// Status entregue na completion de um bio
pub type BioStatus = Result<(), BlockError>;

/// Fila de requisições de um dispositivo de bloco
///
/// O driver completa cada bio chamando `Bio::complete`, possivelmente de
/// contexto de interrupção.
pub trait BlockQueue: Send + Sync {
    /// Limites de endereçamento do dispositivo
    fn limits(&self) -> &QueueLimits;

    /// Entrega o bio ao driver
    fn submit_bio(&self, bio: Bio);
}
