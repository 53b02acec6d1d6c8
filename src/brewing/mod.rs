pub mod states;

pub use states::*;
