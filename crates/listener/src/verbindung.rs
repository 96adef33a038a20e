//! Eine aufgenommene Event-Socket-Verbindung
//!
//! Jede `EslVerbindung` betreibt eine eigene Lese-Schleife, die alle Events
//! der Session in den gemeinsamen Kanal des Listeners weiterleitet. Endet
//! der Strom (Fehler oder EOF), markiert sich die Verbindung inaktiv und
//! schliesst den Sender – der Fehler wird geloggt, nicht propagiert. Die
//! Registry beobachtet Lebendigkeit ausschliesslich ueber das Aktiv-Flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use telegraph_client::{EslLeser, EslSender};
use telegraph_core::{Event, Result, SessionId};
use telegraph_protocol::{abo_befehl, EventFormat};

/// Eine aktive Session zu einem Switch-Peer
pub struct EslVerbindung {
    id: SessionId,
    sender: Arc<dyn EslSender>,
    aktiv: AtomicBool,
    stoppen_tx: watch::Sender<bool>,
}

impl EslVerbindung {
    /// Nimmt eine Verbindung auf und startet ihre Lese-Schleife
    pub fn starten(
        sender: Arc<dyn EslSender>,
        leser: Box<dyn EslLeser>,
        ereignisse_tx: mpsc::Sender<Event>,
    ) -> Arc<Self> {
        let (stoppen_tx, stoppen_rx) = watch::channel(false);
        let verbindung = Arc::new(Self {
            id: SessionId::new(),
            sender,
            aktiv: AtomicBool::new(true),
            stoppen_tx,
        });

        tokio::spawn(lese_schleife(
            Arc::clone(&verbindung),
            leser,
            ereignisse_tx,
            stoppen_rx,
        ));
        verbindung
    }

    /// Die ID dieser Verbindung
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Gibt true zurueck solange die Lese-Schleife laeuft
    pub fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::SeqCst)
    }

    /// Abonniert einen Abo-Schluessel auf dieser Session
    pub async fn abonnieren(&self, format: EventFormat, schluessel: &str) -> Result<()> {
        self.sender.senden(&abo_befehl(format, schluessel)).await
    }

    /// Stoppt die Lese-Schleife; die Verbindung wird geschlossen
    pub fn stoppen(&self) {
        let _ = self.stoppen_tx.send(true);
    }
}

async fn lese_schleife(
    verbindung: Arc<EslVerbindung>,
    mut leser: Box<dyn EslLeser>,
    ereignisse_tx: mpsc::Sender<Event>,
    mut stoppen_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            ergebnis = leser.nachricht_lesen() => {
                match ergebnis {
                    Ok(Some(ereignis)) => {
                        if ereignisse_tx.send(ereignis).await.is_err() {
                            tracing::debug!(session = %verbindung.id, "Event-Kanal geschlossen");
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!(session = %verbindung.id, "Event-Strom beendet");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            session = %verbindung.id,
                            fehler = %e,
                            "Lesefehler auf der Event-Socket-Verbindung"
                        );
                        break;
                    }
                }
            }
            Ok(()) = stoppen_rx.changed() => {
                if *stoppen_rx.borrow() {
                    break;
                }
            }
        }
    }

    verbindung.aktiv.store(false, Ordering::SeqCst);
    if let Err(e) = verbindung.sender.schliessen().await {
        tracing::debug!(session = %verbindung.id, fehler = %e, "Schliessen fehlgeschlagen");
    }
    tracing::debug!(session = %verbindung.id, "Lese-Schleife beendet");
}
