//! Collaborator-Schnittstelle des Listeners
//!
//! Der Kern konsumiert den Event-Socket-Client nur ueber diese beiden
//! Traits. Die Go-Vorlage buendelt Senden und Lesen in einem Objekt;
//! hier ist die Naht explizit geteilt: der Sender ist ein teilbares
//! Handle (Abonnements laufen nebenlaeufig zur Lese-Schleife), der Leser
//! gehoert exklusiv der Lese-Schleife einer Session.

use async_trait::async_trait;
use telegraph_core::{Event, Result};

/// Sende-Haelfte eines Event-Socket-Clients
#[async_trait]
pub trait EslSender: Send + Sync {
    /// Sendet eine Kommandozeile (der Trenner wird angehaengt)
    async fn senden(&self, befehl: &str) -> Result<()>;

    /// Schliesst die Verbindung
    async fn schliessen(&self) -> Result<()>;
}

/// Lese-Haelfte eines Event-Socket-Clients
#[async_trait]
pub trait EslLeser: Send {
    /// Liest das naechste Event aus dem Strom
    ///
    /// Nicht-Event-Nachrichten (Kommando-Antworten, Auth-Anfragen) werden
    /// intern uebersprungen und die Schleife liest weiter. `Ok(None)`
    /// bedeutet Stromende: EOF oder ein Disconnect-Hinweis des Peers.
    async fn nachricht_lesen(&mut self) -> Result<Option<Event>>;
}
