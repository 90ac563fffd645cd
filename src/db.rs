pub mod store;
pub use store::{RentalStore, StoreTx, TransitionRuleStore};
pub mod rule_repo;
pub use rule_repo::TransitionRuleRepository;
pub mod rental_repo;
pub use rental_repo::RentalRepository;

// Store em memória: só para os testes dos serviços
#[cfg(test)]
pub mod memory_repo;
#[cfg(test)]
pub use memory_repo::{MemoryRentalStore, MemoryRuleStore};
