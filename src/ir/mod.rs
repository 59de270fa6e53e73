pub mod interpreter;
pub mod ir_builder;
pub mod ir_display;
pub mod ir_nodes;
pub mod ir_validation;
pub mod serialize;

#[cfg(test)]
mod tests;
