//! # Dispositivos de Bloco
//!
//! Abstração mínima de I/O de bloco consumida pelo Bouncer.
//!
//! | Tipo          | Papel                                          |
//! |---------------|------------------------------------------------|
//! | `Bio`         | segmentos + callback de completion             |
//! | `QueueLimits` | teto de endereçamento e classe de DMA          |
//! | `BlockQueue`  | fila do driver (limites + submissão)           |

pub mod bio;
pub mod traits;

pub use bio::{Bio, BioDirection, BioEndIo, BioFlags, BioVec, DmaClass, QueueLimits};
pub use traits::{BioStatus, BlockError, BlockQueue};
