pub mod family;
pub mod settings;

pub use family::*;
pub use settings::*;
