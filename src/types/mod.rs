pub mod money;
pub mod order;
pub mod trade;

pub use money::Money;
pub use order::{AgentId, IdCounter, Order, OrderId, Side, Symbol};
pub use trade::Trade;
