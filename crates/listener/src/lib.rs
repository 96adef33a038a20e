//! telegraph-listener – Event-Verteilung ueber beliebig viele Switches
//!
//! Dieses Crate implementiert den Kern von Telegraph: eine Registry
//! gleichzeitiger Event-Socket-Sessions, deren eingehende Events in einen
//! gemeinsamen Strom gemergt werden, und einen Dispatcher, der jedes Event
//! an alle Handler mit passendem Abo-Schluessel zustellt.
//!
//! ## Architektur
//!
//! ```text
//! Switch-Peer --> EslVerbindung (Lese-Schleife pro Session)
//!                     |
//!                     v
//!              gemeinsamer Event-Kanal
//!                     |
//!                     v
//!              Dispatch-Schleife ---> Handler (JoinSet, begrenzt)
//!                     ^
//!                     |
//!              Handler-Tabelle (RwLock, Snapshot pro Event)
//! ```
//!
//! Beide Strukturen bleiben gegenseitig konsistent: neue Sessions erben
//! alle registrierten Schluessel, neue Handler werden auf alle offenen
//! Sessions rueckpropagiert.

pub mod fehler;
pub mod handler;
pub mod listener;
pub mod verbindung;

// Bequeme Re-Exporte
pub use fehler::{ListenerFehler, ListenerResult};
pub use handler::{EventHandler, Handler};
pub use listener::EventListener;
pub use telegraph_protocol::EventFormat;
pub use verbindung::EslVerbindung;
