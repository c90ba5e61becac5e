mod account;
mod health;
mod transfer;

pub use account::*;
pub use health::*;
pub use transfer::*;
