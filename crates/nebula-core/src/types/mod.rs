mod ca;
mod node;
mod settings;
mod template;

pub use ca::*;
pub use node::*;
pub use settings::*;
pub use template::*;
