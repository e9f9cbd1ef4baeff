//! Testes do Bounce (decisão, cópias, completion)

use super::sim::{self, Platform, SimQueue, HIGH_START, MAX_PFN};
use crate::arch::context::{
    local_irq_restore, local_irq_save, preempt_count, preempt_disable, preempt_enable,
};
use crate::drivers::block::{
    Bio, BioDirection, BioFlags, BioStatus, BlockError, DmaClass, QueueLimits,
};
use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::Pfn;
use crate::mm::config::{ISA_DMA_THRESHOLD, PAGE_SIZE};
use crate::mm::page::Page;
use crate::mm::pmm::{MemoryLayout, ZoneType};
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

/// Testes do Bounce
pub const BOUNCE_TESTS: &[TestCase] = &[
    TestCase::new("bounce_passthrough_untouched", test_passthrough_untouched),
    TestCase::new("bounce_lowmem_bio_passthrough", test_lowmem_bio_passthrough),
    TestCase::new("bounce_write_round_trip", test_write_round_trip),
    TestCase::new("bounce_read_round_trip", test_read_round_trip),
    TestCase::new("bounce_read_error_no_copy", test_read_error_no_copy),
    TestCase::new("bounce_not_supported_propagates", test_not_supported_propagates),
    TestCase::new("bounce_mixed_segments", test_mixed_segments),
    TestCase::new("bounce_mixed_read_copy_back", test_mixed_read_copy_back),
    TestCase::new("bounce_isa_queue", test_isa_queue),
    TestCase::new("bounce_low_ceiling_uses_isa", test_low_ceiling_uses_isa),
    TestCase::new("bounce_completion_in_irq", test_completion_in_irq),
    TestCase::new("bounce_without_highmem", test_without_highmem),
];

/// O que a callback original recebeu
type Seen = Arc<Spinlock<Option<(BioFlags, usize, BioStatus)>>>;

fn hook(bio: &mut Bio) -> Seen {
    let seen: Seen = Arc::new(Spinlock::new(None));
    let slot = Arc::clone(&seen);
    bio.set_end_io(Box::new(move |bio: Bio, bytes: usize, status: BioStatus| {
        *slot.lock() = Some((bio.flags, bytes, status));
    }));
    seen
}

fn platform() -> Option<Platform> {
    match Platform::new(Platform::config(8, 4)) {
        Ok(p) => Some(p),
        Err(_) => {
            crate::kerror!("(Test) Falha ao montar plataforma simulada");
            None
        }
    }
}

/// Fila que alcança só o direct map
fn lowmem_queue() -> SimQueue {
    SimQueue::new(QueueLimits::new(Pfn::new(HIGH_START)))
}

fn single(direction: BioDirection, page: Page, offset: usize, len: usize) -> Option<Bio> {
    let mut bio = Bio::new(direction, 64);
    bio.add_page(page, offset, len).ok()?;
    Some(bio)
}

fn general_in_use(p: &Platform) -> usize {
    p.bouncer.page_pool().map_or(usize::MAX, |pool| pool.in_use())
}

/// Dispositivo que alcança tudo: bio intacto, zero cópias, zero sombras
fn test_passthrough_untouched() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(0);
    let Some(mut bio) = single(BioDirection::Write, page, 0, PAGE_SIZE) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = SimQueue::new(QueueLimits::new(Pfn::new(MAX_PFN)));
    p.bouncer.submit(&queue, bio);

    let Some(submitted) = queue.take() else {
        return TestResult::Fail;
    };
    check!(submitted.vecs()[0].page == page, "(Test) passthrough trocou a página");
    check!(!submitted.flags.contains(BioFlags::BOUNCED), "(Test) passthrough marcado BOUNCED");
    check!(p.mmu.set_pte_calls() == 0, "(Test) passthrough mapeou janela");
    check!(general_in_use(&p) == 0, "(Test) passthrough alocou sombra");

    submitted.complete(PAGE_SIZE, Ok(()));
    check!(seen.lock().is_some(), "(Test) callback original não chamada");

    let stats = p.bouncer.stats();
    check!(stats.passthrough == 1 && stats.bounced_bios == 0, "(Test) estatística passthrough");
    check!(stats.bytes_copied_write == 0, "(Test) passthrough copiou bytes");
    TestResult::Pass
}

/// Fila limitada, mas todo segmento abaixo do teto
fn test_lowmem_bio_passthrough() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.low(0x3000);
    let Some(bio) = single(BioDirection::Read, page, 0, 512) else {
        return TestResult::Fail;
    };
    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);

    let Some(submitted) = queue.take() else {
        return TestResult::Fail;
    };
    check!(submitted.vecs()[0].page == page, "(Test) segmento baixo trocado");
    check!(general_in_use(&p) == 0, "(Test) sombra alocada sem necessidade");
    TestResult::Pass
}

/// WRITE: sombra tem os dados na submissão e volta ao pool na completion
fn test_write_round_trip() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(1);
    p.mmu.fill(page.pfn(), 0xA5);
    let Some(mut bio) = single(BioDirection::Write, page, 256, 1024) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };

    let vec = shadow.vecs()[0];
    check!(shadow.flags.contains(BioFlags::BOUNCED), "(Test) bio sem BOUNCED");
    check!(vec.page != page, "(Test) segmento alto não substituído");
    check!(vec.page.pfn().as_u64() < HIGH_START, "(Test) sombra fora do alcance");
    check!(vec.offset == 256 && vec.len == 1024, "(Test) geometria do segmento");
    check!(p.mmu.all_bytes(vec.page.pfn(), 256, 1024, 0xA5), "(Test) sombra sem os dados");
    check!(general_in_use(&p) == 1, "(Test) sombra não contabilizada");
    check!(p.highmem.holders(page) == 0, "(Test) cópia deixou kmap pendurado");

    shadow.complete(1024, Ok(()));

    let Some((flags, bytes, status)) = *seen.lock() else {
        return TestResult::Fail;
    };
    check!(status == Ok(()) && bytes == 1024, "(Test) completion original");
    check!(flags.contains(BioFlags::UPTODATE), "(Test) original sem UPTODATE");
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida");
    check!(p.mmu.all_bytes(page.pfn(), 0, PAGE_SIZE, 0xA5), "(Test) original alterado");
    check!(p.bouncer.stats().bytes_copied_write == 1024, "(Test) bytes copiados (write)");
    check!(p.highmem.check_invariants(), "(Test) invariantes do HighMem");
    TestResult::Pass
}

/// READ: dados do dispositivo chegam ao original, só no segmento
fn test_read_round_trip() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(2);
    p.mmu.fill(page.pfn(), 0x11);
    let Some(mut bio) = single(BioDirection::Read, page, 512, 2048) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    check!(p.bouncer.stats().bytes_copied_write == 0, "(Test) read copiou na submissão");

    sim::device_read(&p.mmu, &shadow, 0x5A);
    let depth = preempt_count();
    shadow.complete(2048, Ok(()));

    check!(preempt_count() == depth, "(Test) copy-back deixou preempção desabilitada");
    check!(seen.lock().is_some(), "(Test) callback original não chamada");
    check!(p.mmu.all_bytes(page.pfn(), 512, 2048, 0x5A), "(Test) dados não copiados de volta");
    check!(p.mmu.all_bytes(page.pfn(), 0, 512, 0x11), "(Test) cópia antes do segmento");
    check!(
        p.mmu.all_bytes(page.pfn(), 2560, PAGE_SIZE - 2560, 0x11),
        "(Test) cópia após o segmento"
    );
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida");
    check!(p.mmu.live_ptes() == 0, "(Test) janela atômica sobreviveu");
    check!(p.bouncer.stats().bytes_copied_read == 2048, "(Test) bytes copiados (read)");
    TestResult::Pass
}

/// READ com erro: nada é copiado, sombras liberadas, erro propagado
fn test_read_error_no_copy() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(3);
    p.mmu.fill(page.pfn(), 0x11);
    let Some(mut bio) = single(BioDirection::Read, page, 0, PAGE_SIZE) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    sim::device_read(&p.mmu, &shadow, 0x77);
    shadow.complete(0, Err(BlockError::IoError));

    let Some((flags, _, status)) = *seen.lock() else {
        return TestResult::Fail;
    };
    check!(status == Err(BlockError::IoError), "(Test) erro não propagado");
    check!(!flags.contains(BioFlags::UPTODATE), "(Test) original UPTODATE após erro");
    check!(p.mmu.all_bytes(page.pfn(), 0, PAGE_SIZE, 0x11), "(Test) cópia após erro");
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida após erro");
    TestResult::Pass
}

fn test_not_supported_propagates() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(4);
    let Some(mut bio) = single(BioDirection::Write, page, 0, 512) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    shadow.complete(0, Err(BlockError::NotSupported));

    let Some((flags, _, status)) = *seen.lock() else {
        return TestResult::Fail;
    };
    check!(flags.contains(BioFlags::EOPNOTSUPP), "(Test) EOPNOTSUPP não propagado");
    check!(status == Err(BlockError::NotSupported), "(Test) status original");
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida");
    check!(p.bouncer.stats().not_supported == 1, "(Test) estatística not_supported");
    TestResult::Pass
}

/// Só o segmento inalcançável ganha sombra
fn test_mixed_segments() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let low = p.low(0x2000);
    let high = p.high(5);
    p.mmu.fill(high.pfn(), 0x3C);

    let mut bio = Bio::new(BioDirection::Write, 0);
    if bio.add_page(low, 0, PAGE_SIZE).is_err() || bio.add_page(high, 0, PAGE_SIZE).is_err() {
        return TestResult::Fail;
    }
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    check!(shadow.vecs()[0].page == low, "(Test) segmento baixo substituído");
    check!(shadow.vecs()[1].page != high, "(Test) segmento alto não substituído");
    check!(p.bouncer.stats().bounced_segments == 1, "(Test) segmentos com sombra");

    shadow.complete(2 * PAGE_SIZE, Ok(()));
    check!(seen.lock().is_some(), "(Test) callback original não chamada");
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida");
    TestResult::Pass
}

/// READ misto: copy-back só nos segmentos substituídos, cada um no seu par
fn test_mixed_read_copy_back() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let low = p.low(0x2000);
    let first = p.high(5);
    let second = p.high(6);
    p.mmu.fill(low.pfn(), 0x11);
    p.mmu.fill(first.pfn(), 0x22);
    p.mmu.fill(second.pfn(), 0x33);

    let mut bio = Bio::new(BioDirection::Read, 0);
    if bio.add_page(low, 0, 512).is_err()
        || bio.add_page(first, 256, 1024).is_err()
        || bio.add_page(second, 2048, 2048).is_err()
    {
        return TestResult::Fail;
    }
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    let vecs = shadow.vecs();
    check!(vecs.len() == 3, "(Test) número de segmentos do bio sombra");
    check!(vecs[0].page == low, "(Test) segmento baixo substituído");
    check!(vecs[1].page != first && vecs[2].page != second, "(Test) segmento alto sem sombra");
    check!(vecs[1].page != vecs[2].page, "(Test) sombras repetidas");
    check!(general_in_use(&p) == 2, "(Test) sombras em uso");

    // Dispositivo grava só nas sombras, um byte diferente por segmento
    p.mmu.write(vecs[1].page.pfn(), vecs[1].offset, &vec![0x5A; vecs[1].len]);
    p.mmu.write(vecs[2].page.pfn(), vecs[2].offset, &vec![0x6B; vecs[2].len]);
    shadow.complete(512 + 1024 + 2048, Ok(()));

    check!(seen.lock().is_some(), "(Test) callback original não chamada");
    check!(p.mmu.all_bytes(low.pfn(), 0, PAGE_SIZE, 0x11), "(Test) copy-back tocou segmento baixo");
    check!(p.mmu.all_bytes(first.pfn(), 256, 1024, 0x5A), "(Test) primeiro segmento sem dados");
    check!(p.mmu.all_bytes(first.pfn(), 0, 256, 0x22), "(Test) cópia antes do primeiro segmento");
    check!(
        p.mmu.all_bytes(first.pfn(), 1280, PAGE_SIZE - 1280, 0x22),
        "(Test) cópia após o primeiro segmento"
    );
    check!(p.mmu.all_bytes(second.pfn(), 2048, 2048, 0x6B), "(Test) segundo segmento sem dados");
    check!(p.mmu.all_bytes(second.pfn(), 0, 2048, 0x33), "(Test) cópia antes do segundo segmento");
    check!(general_in_use(&p) == 0, "(Test) sombras não devolvidas");
    check!(p.bouncer.stats().bytes_copied_read == 3072, "(Test) bytes copiados (read)");
    check!(p.mmu.live_ptes() == 0, "(Test) janela atômica sobreviveu");
    TestResult::Pass
}

/// Fila ISA: pool ISA sob demanda, sombras na zona DMA
fn test_isa_queue() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    check!(p.bouncer.isa_pool().is_none(), "(Test) pool ISA criado cedo");

    let mut limits = QueueLimits::new(Pfn::new(MAX_PFN));
    if p.bouncer.set_bounce_limit(&mut limits, ISA_DMA_THRESHOLD - 1).is_err() {
        return TestResult::Fail;
    }
    check!(limits.dma_class.contains(DmaClass::ISA_DMA), "(Test) fila não marcada ISA");
    check!(limits.bounce_pfn == MemoryLayout::isa_limit_pfn(), "(Test) teto ISA");
    let Some(isa) = p.bouncer.isa_pool() else {
        return TestResult::Fail;
    };

    // Página baixa, porém acima de 16 MiB
    let page = p.low(0x2000);
    p.mmu.fill(page.pfn(), 0x42);
    let Some(mut bio) = single(BioDirection::Write, page, 0, PAGE_SIZE) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = SimQueue::new(limits);
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    let shadow_page = shadow.vecs()[0].page;
    check!(isa.contains(shadow_page), "(Test) sombra fora do pool ISA");
    check!(
        p.highmem.layout().zone_of(shadow_page.pfn()) == ZoneType::Dma,
        "(Test) sombra fora da zona DMA"
    );
    check!(p.mmu.all_bytes(shadow_page.pfn(), 0, PAGE_SIZE, 0x42), "(Test) sombra ISA sem dados");
    check!(general_in_use(&p) == 0, "(Test) fila ISA usou pool geral");

    shadow.complete(PAGE_SIZE, Ok(()));
    check!(seen.lock().is_some(), "(Test) callback original não chamada");
    check!(isa.in_use() == 0, "(Test) sombra ISA não devolvida");
    check!(p.bouncer.stats().isa_pages == 1, "(Test) estatística isa_pages");

    // Dispositivo de 64 bits volta a não ter classe ISA
    if p.bouncer.set_bounce_limit(&mut limits, u64::MAX).is_err() {
        return TestResult::Fail;
    }
    check!(limits.dma_class.is_empty(), "(Test) classe ISA persistiu");
    TestResult::Pass
}

/// Completion em contexto de IRQ: copy-back atômico, sem bloquear
fn test_completion_in_irq() -> TestResult {
    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    let page = p.high(6);
    let Some(mut bio) = single(BioDirection::Read, page, 0, PAGE_SIZE) else {
        return TestResult::Fail;
    };
    let seen = hook(&mut bio);

    let queue = lowmem_queue();
    p.bouncer.submit(&queue, bio);
    let Some(shadow) = queue.take() else {
        return TestResult::Fail;
    };
    sim::device_read(&p.mmu, &shadow, 0xE1);

    let irq = local_irq_save();
    preempt_disable();
    shadow.complete(PAGE_SIZE, Ok(()));
    preempt_enable();
    local_irq_restore(irq);

    check!(seen.lock().is_some(), "(Test) callback original não chamada");
    check!(p.mmu.all_bytes(page.pfn(), 0, PAGE_SIZE, 0xE1), "(Test) copy-back em IRQ");
    check!(general_in_use(&p) == 0, "(Test) sombra não devolvida em IRQ");
    TestResult::Pass
}

/// Sem highmem: sem pool geral, tudo passthrough
fn test_without_highmem() -> TestResult {
    let Ok(p) = Platform::with_layout(Platform::config(8, 4), sim::layout_lowmem_only()) else {
        return TestResult::Fail;
    };
    check!(p.bouncer.page_pool().is_none(), "(Test) pool geral criado sem highmem");
    check!(p.frames.outstanding() == 0, "(Test) frames reservados sem highmem");

    let page = p.low(0x2000);
    let Some(bio) = single(BioDirection::Write, page, 0, PAGE_SIZE) else {
        return TestResult::Fail;
    };
    let queue = SimQueue::new(QueueLimits::new(Pfn::new(HIGH_START)));
    p.bouncer.submit(&queue, bio);
    let Some(submitted) = queue.take() else {
        return TestResult::Fail;
    };
    check!(submitted.vecs()[0].page == page, "(Test) bio alterado sem highmem");
    TestResult::Pass
}

/// Envia um write de `page` por uma fila de teto ISA sem classe ISA.
/// Retorna o frame da sombra entregue ao dispositivo.
fn low_ceiling_write(p: &Platform, page: Page) -> Option<Pfn> {
    let ceiling = MemoryLayout::isa_limit_pfn();
    let mut bio = single(BioDirection::Write, page, 0, PAGE_SIZE)?;
    let seen = hook(&mut bio);

    let queue = SimQueue::new(QueueLimits::new(ceiling));
    p.bouncer.submit(&queue, bio);
    let shadow = queue.take()?;
    let spfn = shadow.vecs()[0].page.pfn();
    shadow.complete(PAGE_SIZE, Ok(()));
    seen.lock().as_ref()?;
    Some(spfn)
}

/// Teto abaixo do direct map sem `ISA_DMA`: sombra vem do pool ISA
fn test_low_ceiling_uses_isa() -> TestResult {
    let ceiling = MemoryLayout::isa_limit_pfn();

    let Some(p) = platform() else {
        return TestResult::Fail;
    };
    check!(p.bouncer.isa_pool().is_none(), "(Test) pool ISA criado cedo");
    let page = p.low(0x2000);
    p.mmu.fill(page.pfn(), 0x42);
    let Some(spfn) = low_ceiling_write(&p, page) else {
        return TestResult::Fail;
    };
    check!(spfn < ceiling, "(Test) sombra acima do teto da fila");
    check!(general_in_use(&p) == 0, "(Test) teto baixo usou pool geral");
    let Some(isa) = p.bouncer.isa_pool() else {
        return TestResult::Fail;
    };
    check!(isa.in_use() == 0, "(Test) sombra ISA não devolvida");
    check!(p.bouncer.stats().isa_pages == 1, "(Test) estatística isa_pages");

    // Sem highmem: também não há pool geral para cair
    let Ok(p) = Platform::with_layout(Platform::config(8, 4), sim::layout_lowmem_only()) else {
        return TestResult::Fail;
    };
    let Some(spfn) = low_ceiling_write(&p, p.low(0x2000)) else {
        return TestResult::Fail;
    };
    check!(spfn < ceiling, "(Test) sombra acima do teto sem highmem");
    check!(
        p.bouncer.isa_pool().is_some_and(|isa| isa.in_use() == 0),
        "(Test) pool ISA sem highmem"
    );
    TestResult::Pass
}
