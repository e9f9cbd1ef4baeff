//! # Testes do Subsistema HighMem/Bounce
//!
//! Organização:
//! - `sim.rs` - MMU, alocador físico e fila de bloco simulados
//! - `highmem_test.rs` - pkmap, índice reverso e kmap_atomic
//! - `bounce_test.rs` - decisão, cópias e completion do bounce
//! - `smp_test.rs` - concorrência com threads do host (apenas `cargo test`)
//!
//! As suites são tabelas `TestCase` executadas por `run_highmem_tests()`,
//! no boot (feature `self_test`) ou pelo harness do host.

/// Falha o teste atual com `msg` se `cond` for falso.
macro_rules! check {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            crate::kerror!($msg);
            return crate::klib::test_framework::TestResult::Fail;
        }
    };
}

pub mod bounce_test;


use crate::klib::test_framework::run_test_suite;

/// Executa todas as suites. Retorna `(passed, failed, skipped)`.
pub fn run_highmem_tests() -> (usize, usize, usize) {
    crate::kinfo!("(Test) Testes de HighMem/Bounce");

    let mut total = (0, 0, 0);
    let mut add = |r: (usize, usize, usize)| {
        total.0 += r.0;
        total.1 += r.1;
        total.2 += r.2;
    };

    add(run_test_suite("highmem", highmem_test::HIGHMEM_TESTS));
    add(run_test_suite("bounce", bounce_test::BOUNCE_TESTS));
    #[cfg(test)]
    add(run_test_suite("smp", smp_test::SMP_TESTS));

    if total.1 == 0 {
        crate::kok!("(Test) HighMem/Bounce: todos os testes passaram");
    } else {
        crate::kfail!("(Test) HighMem/Bounce: há falhas");
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_suites_pass() {
        let (passed, failed, _) = run_highmem_tests();
        assert_eq!(failed, 0);
        assert!(passed > 0);
    }
}
