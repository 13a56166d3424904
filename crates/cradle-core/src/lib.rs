pub mod assets;
pub mod coordinator;
pub mod host;
pub mod settings;

pub use assets::*;
pub use coordinator::*;
pub use host::*;
pub use settings::*;
