//! telegraph-switch – der switch-seitige Event-Socket-Peer
//!
//! Implementiert das Wire-Protokoll aus Sicht des Telefonie-Switch:
//! Auth-Handshake, Befehlsannahme, Abonnement-Verwaltung und das Pushen
//! laengen-gerahmter Event-Nachrichten in Plain- oder JSON-Kodierung.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SchalterServer)
//!     |
//!     v
//! SchalterSession (pro Verbindung zwei Tasks)
//!     |  State Machine: Unauthentifiziert -> Offen -> Geschlossen
//!     |
//!     +-- Befehlsschleife   (auth, event, exit, status)
//!     +-- Event-Schleife    (Abo-Matching, Push-Framing)
//! ```
//!
//! Dient als Switch-Emulator fuer Entwicklung und als Gegenstelle der
//! Integrationstests des Listeners.

pub mod server;
pub mod session;

// Bequeme Re-Exporte
pub use server::SchalterServer;
pub use session::{SchalterSession, SessionZustand};
