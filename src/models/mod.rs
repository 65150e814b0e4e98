pub mod inbound;
pub mod pre_apontamento;

pub use inbound::*;
pub use pre_apontamento::*;
