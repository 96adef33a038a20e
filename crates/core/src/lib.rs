//! telegraph-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Telegraph-Crates gemeinsam genutzt werden: den Event-Record,
//! ID-Newtypes und den zentralen Fehler-Enum.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, TelegraphError};
pub use event::Event;
pub use types::SessionId;
