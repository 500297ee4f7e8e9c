//! Governed advisor construction

mod builder;
mod governed;

pub use builder::{SmartSpend, SmartSpendBuilder};
pub use governed::GovernedAdvisor;
