//! Fehlertypen fuer den Listener

use telegraph_core::{SessionId, TelegraphError};
use thiserror::Error;

/// Fehlertyp fuer Registry- und Abonnement-Operationen
#[derive(Debug, Error)]
pub enum ListenerFehler {
    /// Abonnement auf einer einzelnen Session fehlgeschlagen
    ///
    /// Bricht einen Broadcast nie ab; die Fehler aller Sessions werden
    /// gesammelt an den Aufrufer zurueckgegeben.
    #[error("Abonnement auf {session} fehlgeschlagen: {quelle}")]
    Abonnement {
        session: SessionId,
        #[source]
        quelle: TelegraphError,
    },

    /// Die Session-ID ist in der Registry nicht bekannt
    #[error("Unbekannte Session: {0}")]
    UnbekannteSession(SessionId),

    /// Fehler beim Verbindungsaufbau oder Handshake
    #[error(transparent)]
    Verbindung(#[from] TelegraphError),
}

/// Result-Typ fuer den Listener
pub type ListenerResult<T> = Result<T, ListenerFehler>;
