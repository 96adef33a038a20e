//! Schalter-Server – bindet den Socket, akzeptiert Verbindungen
//!
//! Der `SchalterServer` nimmt Verbindungen in einer eigenen Accept-Loop an
//! und fuehrt die Sessions in einer Registry. Injizierte Events werden an
//! jede lebende Session verteilt; jede Session entscheidet selbst anhand
//! ihrer Abonnements, ob sie pusht.
//!
//! `stoppen` schliesst nur die Accept-Ressource – bereits akzeptierte
//! Sessions laufen weiter und werden einzeln gestoppt.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use telegraph_core::{Event, Result, SessionId};

use crate::session::SchalterSession;

/// Groesse der Event-Queue pro Session
const EREIGNIS_QUEUE_GROESSE: usize = 64;

/// Eine registrierte Session samt ihrer Event-Queue
struct SessionEintrag {
    session: SchalterSession,
    ereignisse_tx: mpsc::Sender<Event>,
}

struct ServerInner {
    lokale_adresse: SocketAddr,
    passwort: String,
    core_uuid: Uuid,
    sessions: DashMap<SessionId, SessionEintrag>,
    stoppen_tx: watch::Sender<bool>,
}

/// Switch-seitiger Event-Socket-Server
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SchalterServer {
    inner: Arc<ServerInner>,
}

impl SchalterServer {
    /// Bindet die Adresse und startet die Accept-Loop
    ///
    /// Port 0 ist erlaubt; die tatsaechlich gebundene Adresse liefert
    /// [`lokale_adresse`](Self::lokale_adresse).
    pub async fn starten(adresse: SocketAddr, passwort: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(adresse).await?;
        let lokale_adresse = listener.local_addr()?;
        let (stoppen_tx, stoppen_rx) = watch::channel(false);

        let inner = Arc::new(ServerInner {
            lokale_adresse,
            passwort: passwort.into(),
            core_uuid: Uuid::new_v4(),
            sessions: DashMap::new(),
            stoppen_tx,
        });

        tracing::info!(adresse = %lokale_adresse, "Schalter-Server gestartet");
        tokio::spawn(accept_schleife(listener, Arc::clone(&inner), stoppen_rx));

        Ok(Self { inner })
    }

    /// Die tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.inner.lokale_adresse
    }

    /// Die Core-UUID, mit der ausgehende Events gestempelt werden
    pub fn core_uuid(&self) -> Uuid {
        self.inner.core_uuid
    }

    /// Verteilt ein Event an alle lebenden Sessions
    ///
    /// Fehlt der `Core-UUID`-Header, wird er mit der Server-UUID gesetzt.
    /// Sessions mit voller Queue verpassen das Event (es gibt keine
    /// Persistenz verpasster Events); tote Sessions werden entfernt.
    pub fn ereignis_senden(&self, mut ereignis: Event) {
        if ereignis.header("Core-UUID").is_none() {
            ereignis.header_setzen("Core-UUID", self.inner.core_uuid.to_string());
        }

        let mut tote = Vec::new();
        for eintrag in self.inner.sessions.iter() {
            match eintrag.ereignisse_tx.try_send(ereignis.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(session = %eintrag.key(), "Event-Queue voll, Event verworfen");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tote.push(*eintrag.key());
                }
            }
        }
        for id in tote {
            self.inner.sessions.remove(&id);
            tracing::debug!(session = %id, "Tote Session aus der Registry entfernt");
        }
    }

    /// Zaehlt die offenen Sessions mit einem Abonnement fuer den Schluessel
    pub fn abo_anzahl(&self, schluessel: &str) -> usize {
        self.inner
            .sessions
            .iter()
            .filter(|e| e.session.ist_offen() && e.session.hat_abo(schluessel))
            .count()
    }

    /// Gibt die Anzahl der registrierten Sessions zurueck
    pub fn session_anzahl(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Beendet die Accept-Loop und gibt den Listener frei
    ///
    /// Bereits akzeptierte Sessions laufen weiter; siehe
    /// [`sessions_stoppen`](Self::sessions_stoppen).
    pub fn stoppen(&self) {
        let _ = self.inner.stoppen_tx.send(true);
    }

    /// Stoppt jede registrierte Session einzeln
    pub fn sessions_stoppen(&self) {
        for eintrag in self.inner.sessions.iter() {
            eintrag.session.stoppen();
        }
    }
}

async fn accept_schleife(
    listener: TcpListener,
    inner: Arc<ServerInner>,
    mut stoppen_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            ergebnis = listener.accept() => {
                match ergebnis {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                        let (ereignisse_tx, ereignisse_rx) =
                            mpsc::channel(EREIGNIS_QUEUE_GROESSE);
                        let session = SchalterSession::starten(
                            stream,
                            inner.passwort.clone(),
                            ereignisse_rx,
                        );
                        inner.sessions.insert(
                            session.id(),
                            SessionEintrag {
                                session,
                                ereignisse_tx,
                            },
                        );
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
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
    tracing::info!("Schalter-Server gestoppt");
}
