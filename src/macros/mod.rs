//! Crate-wide helper macros (console printing, pointer/offset helpers).

mod print;
mod ptr;
