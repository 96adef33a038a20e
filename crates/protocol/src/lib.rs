//! telegraph-protocol – das Wire-Protokoll des Event-Sockets
//!
//! Beide Richtungen der Verbindung zu einem Telefonie-Switch:
//!
//! ```text
//! Client -> Peer   Befehlssegmente, getrennt durch \r\n\r\n
//!                  auth <pw> | event plain|json [CUSTOM] <name>... |
//!                  exit | status
//!
//! Peer -> Client   Nachrichten: Header-Block + \n\n + optionaler Body
//!                  command/reply, auth/request, text/disconnect-notice,
//!                  text/event-plain, text/event-json
//! ```
//!
//! Event-Pushes deklarieren `Content-Length` als gerenderte Laenge + 1,
//! weil nach dem Body ein Zeilenumbruch geschrieben wird.

pub mod antworten;
pub mod befehl;
pub mod ereignis_format;
pub mod rahmen;

// Bequeme Re-Exporte
pub use befehl::{abo_befehl, Befehl};
pub use ereignis_format::{ereignis_aus_json, ereignis_aus_plain, EventFormat};
pub use rahmen::{EslNachricht, KommandoCodec, NachrichtenCodec};
