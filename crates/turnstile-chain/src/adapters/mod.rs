//! Chain service adapters.

pub mod mock_chain;

pub use mock_chain::MockChain;
