//! Settings, companion messages and time keeping

pub mod message;
pub mod settings;
pub mod time;
