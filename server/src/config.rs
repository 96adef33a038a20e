//! Daemon-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Daemon ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use telegraph_protocol::EventFormat;

/// Vollstaendige Daemon-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener-Einstellungen
    pub listener: ListenerEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Emulator-Einstellungen (lokaler Schalter fuer Entwicklung)
    pub emulator: EmulatorEinstellungen,
    /// Die Switches, zu denen beim Start verbunden wird
    pub schalter: Vec<SchalterEinstellungen>,
    /// Abo-Schluessel, fuer die der Daemon Log-Handler registriert
    pub abonnements: Vec<String>,
}

/// Listener-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerEinstellungen {
    /// Event-Kodierung der Abonnements: "plain" oder "json"
    pub format: String,
}

impl Default for ListenerEinstellungen {
    fn default() -> Self {
        Self {
            format: "json".into(),
        }
    }
}

impl ListenerEinstellungen {
    /// Gibt die konfigurierte Event-Kodierung zurueck
    ///
    /// Unbekannte Werte fallen mit Warnung auf `json` zurueck.
    pub fn event_format(&self) -> EventFormat {
        EventFormat::parsen(&self.format).unwrap_or_else(|| {
            tracing::warn!(format = %self.format, "Unbekanntes Event-Format, verwende json");
            EventFormat::Json
        })
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Lokaler Schalter-Emulator fuer Entwicklung und Demos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorEinstellungen {
    /// Startet einen eingebetteten Schalter-Server
    pub aktiviert: bool,
    /// Bind-Adresse des Emulators
    pub adresse: String,
    /// Passwort des Emulators
    pub passwort: String,
}

impl Default for EmulatorEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            adresse: "127.0.0.1:8021".into(),
            passwort: "ClueCon".into(),
        }
    }
}

/// Ein Switch-Endpunkt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchalterEinstellungen {
    /// Hostname oder IP des Switch
    pub host: String,
    /// Port des Event-Sockets
    pub port: u16,
    /// Plaintext-Passwort
    pub passwort: String,
    /// Zeitlimit fuer Aufbau und Handshake in Sekunden
    pub timeout_sek: u64,
}

impl Default for SchalterEinstellungen {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8021,
            passwort: "ClueCon".into(),
            timeout_sek: 5,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }
}
