//! Framework de testes do kernel
//!
//! Suites são tabelas `const` de `TestCase`; o runner loga cada resultado
//! no sink do kernel e devolve a contagem `(passed, failed, skipped)`.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa suite de testes
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("(Test) === Executando suite:");
    crate::kinfo!(name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Pass => {
                crate::kok!(test.name);
                passed += 1;
            }
            TestResult::Fail => {
                crate::kfail!(test.name);
                failed += 1;
            }
            TestResult::Skip => {
                crate::kwarn!("(Test) [SKIP] ");
                crate::kwarn!(test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!("(Test) Resultados: passed=", passed);
    if failed > 0 {
        crate::kerror!("(Test) Resultados: failed=", failed);
    }
    (passed, failed, skipped)
}
