use super::{Pfn, PhysAddr, VirtAddr};
use crate::mm::config::{PAGE_SHIFT, PAGE_SIZE};

/// Frame que contém o endereço físico
#[inline]
pub const fn phys_to_pfn(phys: PhysAddr) -> Pfn {
    Pfn::new(phys.as_u64() >> PAGE_SHIFT)
}

/// Endereço virtual da janela `index` de uma região que começa em `base`
#[inline]
pub fn window_addr(base: VirtAddr, index: usize) -> VirtAddr {
    base.add((index * PAGE_SIZE) as u64)
}

/// Índice da janela que contém `addr`, ou `None` fora de `[base, base + slots)`
#[inline]
pub fn window_index(base: VirtAddr, slots: usize, addr: VirtAddr) -> Option<usize> {
    if addr < base {
        return None;
    }
    let index = ((addr.as_u64() - base.as_u64()) >> PAGE_SHIFT) as usize;
    if index < slots {
        Some(index)
    } else {
        None
    }
}
