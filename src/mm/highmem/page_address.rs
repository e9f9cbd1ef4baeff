//! # Page Address Map (índice reverso)
//!
//! Mapeia página → endereço da janela kmap em que ela está mapeada agora.
//!
//! ## Estrutura
//!
//! ```text
//! buckets[hash(pfn)] ──▶ head ─▶ nó ─▶ nó ─▶ NIL     (IrqSpinlock por bucket)
//! free               ──▶ nó ─▶ nó ─▶ ... ─▶ NIL       (IrqSpinlock próprio)
//!
//! nodes: arena fixa de N nós (um por janela), ligada por índice
//! ```
//!
//! Cada nó pertence a exatamente UM bucket ou à free list. A arena tem a
//! mesma capacidade da tabela de janelas: free list vazia significa índice
//! e tabela dessincronizados, e isso é fatal.
//!
//! Os locks nunca são aninhados entre si: o nó sai da free list antes de
//! o bucket ser travado, e volta a ela depois que o bucket foi solto.

use crate::mm::addr::{Pfn, VirtAddr};
use crate::mm::page::Page;
use crate::sync::IrqSpinlock;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Índice de nó na arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    const NIL: Self = Self(u32::MAX);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Entrada (página, endereço).
///
/// Campos atômicos só são tocados por quem segura o lock que é dono do nó
/// (bucket ou free list); o lock fornece a ordenação, daí `Relaxed`.
struct AddressNode {
    pfn: AtomicU64,
    vaddr: AtomicU64,
    next: AtomicU32,
}

impl AddressNode {
    fn new(next: NodeId) -> Self {
        Self {
            pfn: AtomicU64::new(0),
            vaddr: AtomicU64::new(0),
            next: AtomicU32::new(next.0),
        }
    }

    #[inline]
    fn next(&self) -> NodeId {
        NodeId(self.next.load(Ordering::Relaxed))
    }

    #[inline]
    fn set_next(&self, next: NodeId) {
        self.next.store(next.0, Ordering::Relaxed);
    }

    #[inline]
    fn pfn(&self) -> Pfn {
        Pfn::new(self.pfn.load(Ordering::Relaxed))
    }

    #[inline]
    fn vaddr(&self) -> VirtAddr {
        VirtAddr::new(self.vaddr.load(Ordering::Relaxed))
    }
}

/// Lista de um bucket em ordem de inserção
#[derive(Clone, Copy)]
struct Bucket {
    head: NodeId,
    tail: NodeId,
}

impl Bucket {
    const EMPTY: Self = Self {
        head: NodeId::NIL,
        tail: NodeId::NIL,
    };
}

/// Hash FNV-1a sobre os bytes do pfn
#[inline]
fn pa_hash(pfn: Pfn) -> u64 {
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in pfn.as_u64().to_le_bytes() {
        state ^= byte as u64;
        state = state.wrapping_mul(0x0000_0100_0000_01b3);
    }
    state
}

/// Índice reverso página → janela.
pub struct PageAddressMap {
    nodes: Box<[AddressNode]>,
    buckets: Box<[IrqSpinlock<Bucket>]>,
    free: IrqSpinlock<NodeId>,
    mask: usize,
    assigned: AtomicUsize,
}

impl PageAddressMap {
    /// Cria o índice com `capacity` nós e `2^hash_order` buckets.
    ///
    /// `capacity` e `hash_order` já foram validados por `HighmemConfig`.
    pub fn new(capacity: usize, hash_order: u32) -> Self {
        let nodes: Box<[AddressNode]> = (0..capacity)
            .map(|i| {
                let next = if i + 1 < capacity {
                    NodeId((i + 1) as u32)
                } else {
                    NodeId::NIL
                };
                AddressNode::new(next)
            })
            .collect();

        let bucket_count = 1usize << hash_order;
        let buckets: Box<[IrqSpinlock<Bucket>]> = (0..bucket_count)
            .map(|_| IrqSpinlock::new(Bucket::EMPTY))
            .collect();

        let head = if capacity > 0 { NodeId(0) } else { NodeId::NIL };

        crate::ktrace!("(PgAddr) Nós=", capacity);
        crate::ktrace!("(PgAddr) Buckets=", bucket_count);

        Self {
            nodes,
            buckets,
            free: IrqSpinlock::new(head),
            mask: bucket_count - 1,
            assigned: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn bucket_of(&self, pfn: Pfn) -> &IrqSpinlock<Bucket> {
        &self.buckets[(pa_hash(pfn) as usize) & self.mask]
    }

    #[inline]
    fn node(&self, id: NodeId) -> &AddressNode {
        &self.nodes[id.index()]
    }

    /// Procura no bucket já travado.
    fn find(&self, bucket: &Bucket, pfn: Pfn) -> Option<NodeId> {
        let mut cur = bucket.head;
        while !cur.is_nil() {
            let node = self.node(cur);
            if node.pfn() == pfn {
                return Some(cur);
            }
            cur = node.next();
        }
        None
    }

    /// Endereço da janela em que a página está mapeada, se houver.
    pub fn lookup(&self, pfn: Pfn) -> Option<VirtAddr> {
        let bucket = self.bucket_of(pfn).lock();
        self.find(&bucket, pfn).map(|id| self.node(id).vaddr())
    }

    /// Registra `page → vaddr`.
    ///
    /// Página baixa, página já registrada ou free list vazia são fatais.
    pub fn assign(&self, page: Page, vaddr: VirtAddr) {
        if !page.is_highmem() {
            crate::kbug!("(PgAddr) assign de página fora de highmem, pfn=", page.pfn().as_u64());
        }
        let pfn = page.pfn();

        let id = {
            let mut free = self.free.lock();
            let id = *free;
            if id.is_nil() {
                crate::kbug!(
                    "(PgAddr) free list vazia: índice dessincronizado, pfn=",
                    pfn.as_u64()
                );
            }
            *free = self.node(id).next();
            id
        };

        let node = self.node(id);
        node.pfn.store(pfn.as_u64(), Ordering::Relaxed);
        node.vaddr.store(vaddr.as_u64(), Ordering::Relaxed);
        node.set_next(NodeId::NIL);

        let mut bucket = self.bucket_of(pfn).lock();
        if self.find(&bucket, pfn).is_some() {
            crate::kbug!("(PgAddr) página já possui janela, pfn=", pfn.as_u64());
        }
        if bucket.tail.is_nil() {
            bucket.head = id;
        } else {
            self.node(bucket.tail).set_next(id);
        }
        bucket.tail = id;
        self.assigned.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove a entrada da página. Entrada inexistente é fatal.
    pub fn clear(&self, pfn: Pfn) {
        let id = {
            let mut bucket = self.bucket_of(pfn).lock();
            let mut prev = NodeId::NIL;
            let mut cur = bucket.head;
            while !cur.is_nil() && self.node(cur).pfn() != pfn {
                prev = cur;
                cur = self.node(cur).next();
            }
            if cur.is_nil() {
                crate::kbug!("(PgAddr) clear de página sem entrada, pfn=", pfn.as_u64());
            }

            let next = self.node(cur).next();
            if prev.is_nil() {
                bucket.head = next;
            } else {
                self.node(prev).set_next(next);
            }
            if bucket.tail == cur {
                bucket.tail = prev;
            }
            self.assigned.fetch_sub(1, Ordering::Relaxed);
            cur
        };

        let mut free = self.free.lock();
        self.node(id).set_next(*free);
        *free = id;
    }

    /// Entradas presentes nos buckets
    #[inline]
    pub fn len(&self) -> usize {
        self.assigned.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Nós na free list (percorre a lista; diagnóstico)
    pub fn free_count(&self) -> usize {
        let free = self.free.lock();
        let mut count = 0;
        let mut cur = *free;
        while !cur.is_nil() {
            count += 1;
            cur = self.node(cur).next();
        }
        count
    }

    /// Snapshot de todas as entradas (diagnóstico)
    pub fn entries(&self) -> Vec<(Pfn, VirtAddr)> {
        let mut out = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter() {
            let bucket = bucket.lock();
            let mut cur = bucket.head;
            while !cur.is_nil() {
                let node = self.node(cur);
                out.push((node.pfn(), node.vaddr()));
                cur = node.next();
            }
        }
        out
    }
}
