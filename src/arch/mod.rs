//! Architecture-specific (RISC-V) primitives: CPU register access.

pub(crate) mod cpu;
