pub mod settings;

pub use settings::{Backend, ControllerKind, Network, Radio, Settings};
