//! telegraph-server – Bibliotheks-Root
//!
//! Deklariert die Daemon-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use telegraph_listener::EventListener;
use telegraph_switch::SchalterServer;

use config::ServerConfig;

/// Haelt den laufenden Daemon-Zustand zusammen
pub struct Daemon {
    pub config: ServerConfig,
}

impl Daemon {
    /// Erstellt einen neuen Daemon aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Daemon und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Optional den eingebetteten Schalter-Emulator starten
    /// 2. Log-Handler fuer alle konfigurierten Abo-Schluessel registrieren
    /// 3. Alle konfigurierten Switch-Verbindungen oeffnen
    /// 4. Auf Ctrl-C warten, dann geordnet stoppen
    pub async fn starten(self) -> Result<()> {
        let emulator = if self.config.emulator.aktiviert {
            let adresse = self.config.emulator.adresse.parse()?;
            let server =
                SchalterServer::starten(adresse, self.config.emulator.passwort.clone()).await?;
            tracing::info!(adresse = %server.lokale_adresse(), "Schalter-Emulator gestartet");
            Some(server)
        } else {
            None
        };

        let listener = EventListener::mit_format(self.config.listener.event_format());

        for schluessel in &self.config.abonnements {
            let fehler = listener
                .handler_hinzufuegen(schluessel.clone(), log_handler(schluessel.clone()))
                .await;
            for f in fehler {
                tracing::warn!(schluessel = %schluessel, fehler = %f, "Abonnement unvollstaendig");
            }
        }

        for schalter in &self.config.schalter {
            let ergebnis = listener
                .verbindung_oeffnen(
                    &schalter.host,
                    &schalter.passwort,
                    schalter.port,
                    Duration::from_secs(schalter.timeout_sek),
                )
                .await;
            match ergebnis {
                Ok(session) => {
                    tracing::info!(
                        host = %schalter.host,
                        port = schalter.port,
                        session = %session,
                        "Switch verbunden"
                    );
                }
                // ein unerreichbarer Switch haelt die uebrigen nicht auf
                Err(e) => {
                    tracing::error!(
                        host = %schalter.host,
                        port = schalter.port,
                        fehler = %e,
                        "Switch nicht erreichbar"
                    );
                }
            }
        }

        tracing::info!("Daemon laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Daemon wird beendet");

        listener.stoppen();
        if let Some(server) = emulator {
            server.stoppen();
            server.sessions_stoppen();
        }
        Ok(())
    }
}

/// Baut den Log-Handler fuer einen Abo-Schluessel
fn log_handler(schluessel: String) -> telegraph_listener::Handler {
    Arc::new(move |ereignis| {
        tracing::info!(
            schluessel = %schluessel,
            event = %ereignis.serialisieren_plain().trim_end(),
            "Event empfangen"
        );
    })
}
