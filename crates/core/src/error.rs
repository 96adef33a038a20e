//! Fehlertypen fuer Telegraph
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Telegraph
pub type Result<T> = std::result::Result<T, TelegraphError>;

/// Alle moeglichen Fehler im Telegraph-System
#[derive(Debug, Error)]
pub enum TelegraphError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    // --- Authentifizierung ---
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    Authentifizierung(String),

    // --- Protokoll ---
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    // --- Abonnements & Versand ---
    #[error("Senden fehlgeschlagen: {0}")]
    SendeFehler(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl TelegraphError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = TelegraphError::Authentifizierung("Falsches Passwort".into());
        assert_eq!(
            e.to_string(),
            "Authentifizierung fehlgeschlagen: Falsches Passwort"
        );
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(TelegraphError::Zeitlimit("test".into()).ist_wiederholbar());
        assert!(!TelegraphError::Protokoll("test".into()).ist_wiederholbar());
    }

    #[test]
    fn io_fehler_konvertierung() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Rohrbruch");
        let e: TelegraphError = io.into();
        assert!(matches!(e, TelegraphError::Io(_)));
    }
}
