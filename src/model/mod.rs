pub mod cycle_worker;
pub mod decision_engine;
pub mod governor;
pub mod tunables;

#[cfg(test)]
pub(crate) mod testing;
