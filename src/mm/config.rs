//! # Configuração do Módulo de Memória Alta
//!
//! Define constantes, layout das janelas e a configuração de runtime
//! (`HighmemConfig`) do subsistema HighMem/Bounce.

use crate::mm::addr::VirtAddr;
use crate::mm::error::{MmError, MmResult};

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Bits de offset dentro de uma página
pub const PAGE_SHIFT: usize = 12;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

// =============================================================================
// LAYOUT DE MEMÓRIA VIRTUAL
// =============================================================================

/// Número de janelas kmap persistentes (potência de 2)
pub const LAST_PKMAP: usize = 1024;

/// Base da região de janelas kmap persistentes
pub const PKMAP_BASE: u64 = 0xFFFF_FD00_0000_0000;

/// Base da região fixmap de janelas atômicas por CPU
pub const FIXMAP_KMAP_BASE: u64 = 0xFFFF_FD80_0000_0000;

// =============================================================================
// ÍNDICE REVERSO
// =============================================================================

/// Ordem da tabela hash de page_address (2^7 = 128 buckets)
pub const PA_HASH_ORDER: u32 = 7;

// =============================================================================
// BOUNCE
// =============================================================================

/// Páginas sombra no pool geral
pub const POOL_SIZE: usize = 64;

/// Páginas sombra no pool ISA (dispositivos legados de 24 bits)
pub const ISA_POOL_SIZE: usize = 16;

/// Limite de endereçamento ISA DMA (16 MiB)
pub const ISA_DMA_THRESHOLD: u64 = 16 * 1024 * 1024;

// =============================================================================
// CONFIGURAÇÃO SMP / ESPERA
// =============================================================================

/// Número máximo de CPUs suportadas
pub const MAX_CPUS: usize = 64;

/// Iterações de spin antes de estacionar na WaitQueue
pub const WAIT_SPIN_LIMIT: u32 = 128;

// =============================================================================
// CONFIGURAÇÃO DE RUNTIME
// =============================================================================

/// Parâmetros do subsistema, validados uma vez na inicialização.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighmemConfig {
    /// Número de janelas persistentes (N)
    pub pkmap_slots: usize,
    /// Endereço da primeira janela persistente
    pub pkmap_base: VirtAddr,
    /// Ordem da tabela hash do índice reverso
    pub hash_order: u32,
    /// Endereço da primeira janela atômica
    pub fixmap_base: VirtAddr,
    /// Núcleos com janelas atômicas
    pub max_cpus: usize,
    /// Páginas sombra do pool geral
    pub pool_size: usize,
    /// Páginas sombra do pool ISA
    pub isa_pool_size: usize,
    /// Spins antes de estacionar
    pub wait_spin_limit: u32,
}

impl Default for HighmemConfig {
    fn default() -> Self {
        Self {
            pkmap_slots: LAST_PKMAP,
            pkmap_base: VirtAddr::new(PKMAP_BASE),
            hash_order: PA_HASH_ORDER,
            fixmap_base: VirtAddr::new(FIXMAP_KMAP_BASE),
            max_cpus: MAX_CPUS,
            pool_size: POOL_SIZE,
            isa_pool_size: ISA_POOL_SIZE,
            wait_spin_limit: WAIT_SPIN_LIMIT,
        }
    }
}

impl HighmemConfig {
    /// Número de buckets do índice reverso
    #[inline]
    pub const fn hash_buckets(&self) -> usize {
        1 << self.hash_order
    }

    /// Fim (exclusivo) da região de janelas persistentes
    #[inline]
    pub fn pkmap_end(&self) -> VirtAddr {
        self.pkmap_base.add((self.pkmap_slots * PAGE_SIZE) as u64)
    }

    /// Valida a configuração.
    pub fn validate(&self) -> MmResult<()> {
        if self.pkmap_slots == 0 || !self.pkmap_slots.is_power_of_two() {
            return Err(MmError::InvalidParameter);
        }
        // Índices de nó são u32 com sentinela u32::MAX
        if self.pkmap_slots >= u32::MAX as usize {
            return Err(MmError::InvalidSize);
        }
        if self.hash_order == 0 || self.hash_order > 16 {
            return Err(MmError::InvalidParameter);
        }
        if !self.pkmap_base.is_aligned(PAGE_SIZE as u64)
            || !self.fixmap_base.is_aligned(PAGE_SIZE as u64)
        {
            return Err(MmError::NotAligned);
        }
        if self.max_cpus == 0 || self.max_cpus > MAX_CPUS {
            return Err(MmError::InvalidParameter);
        }
        if self.pool_size == 0 || self.isa_pool_size == 0 {
            return Err(MmError::InvalidSize);
        }
        Ok(())
    }
}

// =============================================================================
// FUNÇÕES UTILITÁRIAS
// =============================================================================

/// Alinha valor para cima ao múltiplo de align
#[inline(always)]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Alinha valor para baixo ao múltiplo de align
#[inline(always)]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

/// Verifica se valor está alinhado
#[inline(always)]
pub const fn is_aligned(val: usize, align: usize) -> bool {
    val & (align - 1) == 0
}
