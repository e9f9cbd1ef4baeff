//! Kernel Library (KLib).
//!
//! Utilitários agnósticos de hardware para uso interno do subsistema.

pub mod test_framework;
