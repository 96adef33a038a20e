//! Handler-Callbacks und ihre Tabelleneintraege

use std::sync::Arc;
use telegraph_core::Event;

/// Ein Anwendungs-Callback fuer zugestellte Events
///
/// Laeuft als eigene Arbeitseinheit; eine Panik im Handler erreicht die
/// Dispatch-Schleife nicht.
pub type Handler = Arc<dyn Fn(Arc<Event>) + Send + Sync + 'static>;

/// Ein Eintrag der Handler-Tabelle
///
/// Mehrere Eintraege duerfen denselben Schluessel tragen; alle werden als
/// unabhaengige Abonnenten bedient, ohne Reihenfolgegarantie.
#[derive(Clone)]
pub struct EventHandler {
    /// Abo-Schluessel (Event-Name oder `"CUSTOM <subclass>"`)
    pub schluessel: String,
    /// Der Callback
    pub handler: Handler,
}

impl EventHandler {
    /// Erstellt einen neuen Tabelleneintrag
    pub fn neu(schluessel: impl Into<String>, handler: Handler) -> Self {
        Self {
            schluessel: schluessel.into(),
            handler,
        }
    }
}
