pub mod function_fusion;
pub(crate) mod inline;

#[cfg(test)]
mod tests;
