//! # Estatísticas do Bounce

use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct BounceCounters {
    pub passthrough: AtomicU64,
    pub bounced_bios: AtomicU64,
    pub bounced_segments: AtomicU64,
    pub bytes_copied_write: AtomicU64,
    pub bytes_copied_read: AtomicU64,
    pub isa_pages: AtomicU64,
    pub general_pages: AtomicU64,
    pub completions: AtomicU64,
    pub not_supported: AtomicU64,
}

impl BounceCounters {
    #[inline]
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BounceStats {
        BounceStats {
            passthrough: self.passthrough.load(Ordering::Relaxed),
            bounced_bios: self.bounced_bios.load(Ordering::Relaxed),
            bounced_segments: self.bounced_segments.load(Ordering::Relaxed),
            bytes_copied_write: self.bytes_copied_write.load(Ordering::Relaxed),
            bytes_copied_read: self.bytes_copied_read.load(Ordering::Relaxed),
            isa_pages: self.isa_pages.load(Ordering::Relaxed),
            general_pages: self.general_pages.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            not_supported: self.not_supported.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot das estatísticas de bounce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BounceStats {
    /// Bios submetidos sem reescrita
    pub passthrough: u64,
    pub bounced_bios: u64,
    pub bounced_segments: u64,
    /// Bytes copiados para sombras na submissão (write)
    pub bytes_copied_write: u64,
    /// Bytes copiados de volta na completion (read)
    pub bytes_copied_read: u64,
    /// Páginas sombra tiradas do pool ISA
    pub isa_pages: u64,
    /// Páginas sombra tiradas do pool geral
    pub general_pages: u64,
    /// Completions de bios reescritos
    pub completions: u64,
    /// Completions com operação não suportada
    pub not_supported: u64,
}
