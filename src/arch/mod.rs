//! # Hardware Abstraction Layer (HAL)
//!
//! O módulo `arch` é a **única** ponte entre o subsistema HighMem e o hardware.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **CPU:** controle de IRQ, ID do núcleo e contadores de preempção (`context`).
//! - **MMU:** o trait `MmuOps` descreve o que o kernel fornece (PTE, TLB, cache).
//! - **Seleção de Plataforma:** `x86_64` em bare metal, `hosted` nos demais alvos
//!   (testes no host).

pub mod context;
pub mod traits;

// Seleção de Arquitetura: x86_64 bare metal
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use x86_64::Cpu;

// Demais alvos: modelo em software
#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
pub mod hosted;

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
pub use hosted::HostedCpu as Cpu;

pub use traits::*;
