//! # Bio - Requisição de I/O de bloco
//!
//! Lista ordenada de segmentos (página, offset, tamanho) mais a callback
//! de completion `(bio, bytes, status)`.

use super::traits::{BioStatus, BlockError};
use crate::mm::addr::Pfn;
use crate::mm::config::PAGE_SIZE;
use crate::mm::error::{MmError, MmResult};
use crate::mm::page::Page;
use alloc::boxed::Box;
use alloc::vec::Vec;
use bitflags::bitflags;

/// Um segmento de bio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BioVec {
    pub page: Page,
    pub len: usize,
    pub offset: usize,
}

impl BioVec {
    /// Segmento validado: não vazio e contido na página
    pub fn new(page: Page, offset: usize, len: usize) -> MmResult<Self> {
        if len == 0 {
            return Err(MmError::InvalidSize);
        }
        if offset >= PAGE_SIZE || len > PAGE_SIZE - offset {
            return Err(MmError::SegmentOutOfRange);
        }
        Ok(Self { page, len, offset })
    }
}

/// Direção da transferência
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioDirection {
    /// Dispositivo → memória
    Read,
    /// Memória → dispositivo
    Write,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BioFlags: u32 {
        /// Dados válidos após completion
        const UPTODATE   = 1 << 0;
        /// Bio com páginas sombra no lugar das originais
        const BOUNCED    = 1 << 1;
        /// Dispositivo recusou a operação
        const EOPNOTSUPP = 1 << 2;
    }
}

bitflags! {
    /// Classe de DMA do dispositivo
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaClass: u32 {
        /// Só alcança a zona DMA baixa (ISA, 24 bits)
        const ISA_DMA = 1 << 0;
    }
}

/// Limites de endereçamento de uma fila
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Primeiro frame que o dispositivo NÃO alcança
    pub bounce_pfn: Pfn,
    pub dma_class: DmaClass,
}

impl QueueLimits {
    /// Dispositivo que alcança todo frame abaixo de `bounce_pfn`
    pub const fn new(bounce_pfn: Pfn) -> Self {
        Self {
            bounce_pfn,
            dma_class: DmaClass::empty(),
        }
    }
}

/// Callback de completion
pub type BioEndIo = Box<dyn FnOnce(Bio, usize, BioStatus) + Send>;

/// Requisição de I/O
pub struct Bio {
    pub sector: u64,
    pub flags: BioFlags,
    direction: BioDirection,
    vecs: Vec<BioVec>,
    end_io: Option<BioEndIo>,
}

impl Bio {
    pub fn new(direction: BioDirection, sector: u64) -> Self {
        Self {
            sector,
            flags: BioFlags::empty(),
            direction,
            vecs: Vec::new(),
            end_io: None,
        }
    }

    /// Adiciona um segmento validado
    pub fn add_page(&mut self, page: Page, offset: usize, len: usize) -> MmResult<()> {
        self.vecs.push(BioVec::new(page, offset, len)?);
        Ok(())
    }

    /// Adiciona segmento já validado
    pub fn push(&mut self, vec: BioVec) {
        self.vecs.push(vec);
    }

    #[inline]
    pub fn direction(&self) -> BioDirection {
        self.direction
    }

    #[inline]
    pub fn is_write(&self) -> bool {
        self.direction == BioDirection::Write
    }

    #[inline]
    pub fn vecs(&self) -> &[BioVec] {
        &self.vecs
    }

    /// Total de bytes do bio
    pub fn size(&self) -> usize {
        self.vecs.iter().map(|v| v.len).sum()
    }

    /// Instala a callback de completion (substitui a anterior)
    pub fn set_end_io(&mut self, end_io: BioEndIo) {
        self.end_io = Some(end_io);
    }

    /// Completa o bio: atualiza flags e chama a callback.
    ///
    /// Chamado pelo driver, possivelmente de contexto de interrupção.
    pub fn complete(mut self, bytes_done: usize, status: BioStatus) {
        match status {
            Ok(()) => self.flags.insert(BioFlags::UPTODATE),
            Err(e) => {
                self.flags.remove(BioFlags::UPTODATE);
                if e == BlockError::NotSupported {
                    self.flags.insert(BioFlags::EOPNOTSUPP);
                }
            }
        }
        if let Some(end_io) = self.end_io.take() {
            end_io(self, bytes_done, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_segment_geometry() {
        let page = Page::low(Pfn::new(0x2000));
        assert!(BioVec::new(page, 0, PAGE_SIZE).is_ok());
        assert_eq!(BioVec::new(page, 0, 0), Err(MmError::InvalidSize));
        assert_eq!(
            BioVec::new(page, 4000, 200),
            Err(MmError::SegmentOutOfRange)
        );
        assert_eq!(
            BioVec::new(page, PAGE_SIZE, 1),
            Err(MmError::SegmentOutOfRange)
        );
    }

    #[test]
    fn test_segment_huge_len_rejected() {
        let page = Page::low(Pfn::new(0x2000));
        assert_eq!(
            BioVec::new(page, 1, usize::MAX),
            Err(MmError::SegmentOutOfRange)
        );
        assert_eq!(
            BioVec::new(page, PAGE_SIZE - 1, usize::MAX - 2),
            Err(MmError::SegmentOutOfRange)
        );
        assert!(BioVec::new(page, PAGE_SIZE - 1, 1).is_ok());
    }

    #[test]
    fn test_complete_invokes_end_io() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut bio = Bio::new(BioDirection::Read, 8);
        bio.add_page(Page::low(Pfn::new(0x2000)), 512, 1024).unwrap();
        assert_eq!(bio.size(), 1024);

        let s = Arc::clone(&seen);
        bio.set_end_io(Box::new(move |bio: Bio, bytes: usize, status: BioStatus| {
            assert!(bio.flags.contains(BioFlags::UPTODATE));
            assert_eq!(status, Ok(()));
            s.store(bytes, Ordering::SeqCst);
        }));
        bio.complete(1024, Ok(()));
        assert_eq!(seen.load(Ordering::SeqCst), 1024);
    }

    #[test]
    fn test_not_supported_sets_flag() {
        let mut bio = Bio::new(BioDirection::Write, 0);
        bio.set_end_io(Box::new(|bio: Bio, _: usize, status: BioStatus| {
            assert!(bio.flags.contains(BioFlags::EOPNOTSUPP));
            assert!(!bio.flags.contains(BioFlags::UPTODATE));
            assert_eq!(status, Err(BlockError::NotSupported));
        }));
        bio.complete(0, Err(BlockError::NotSupported));
    }
}
