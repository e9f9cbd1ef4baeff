use core::fmt;

/// Page Frame Number: identidade de uma página física, independente de
/// qualquer endereço virtual em que ela esteja mapeada.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pfn(u64);

impl Pfn {
    #[inline]
    pub const fn new(pfn: u64) -> Self {
        Self(pfn)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Frame `count` posições adiante
    #[inline]
    pub const fn add(self, count: u64) -> Self {
        Self(self.0 + count)
    }
}

impl fmt::Debug for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pfn({:#x})", self.0)
    }
}

impl fmt::LowerHex for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
