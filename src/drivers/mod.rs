//! # Driver Layer
//!
//! Só a parte da camada de drivers que o subsistema de memória alta
//! consome: a abstração de I/O de bloco.
//!
//! ```text
//! Bouncer ──▶ block::BlockQueue ──▶ driver real (ATA, VirtIO, ...)
//!    ▲                                   │
//!    └──────── Bio::complete ◀───────────┘ (IRQ)
//! ```

pub mod block;
