//! Schalter-Session – die switch-seitige Protokoll-Zustandsmaschine
//!
//! Jede akzeptierte Verbindung bekommt eine `SchalterSession` mit zwei
//! eigenen tokio-Tasks: einer liest und zerlegt Befehlssegmente, einer
//! draint den Event-Kanal der Session und pusht passende Events raus.
//!
//! ## State Machine
//! ```text
//! Unauthentifiziert -> Offen -> Geschlossen
//!        |                          ^
//!        +------ auth-Fehler -------+
//! ```
//!
//! Beide Schleifen suspendieren auf I/O bzw. Kanal-Empfang UND auf dem
//! Schliess-Signal der Session; ein Schreibfehler schliesst die Session.
//! Befehlssegmente werden als unabhaengige Arbeitseinheiten in ein
//! `JoinSet` dispatcht – Ankunftsreihenfolge ist die Byte-Reihenfolge,
//! Fertigstellungsreihenfolge ist nicht garantiert.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;

use telegraph_core::event::{HEADER_EVENT_NAME, HEADER_EVENT_SUBCLASS};
use telegraph_core::{Event, SessionId};
use telegraph_protocol::{antworten, Befehl, EventFormat, KommandoCodec};

// ---------------------------------------------------------------------------
// Sessionzustand
// ---------------------------------------------------------------------------

/// Zustand einer Schalter-Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Verbunden, aber noch nicht authentifiziert
    Unauthentifiziert,
    /// Authentifiziert, nimmt Befehle an und pusht Events
    Offen,
    /// Beendet; es findet kein I/O mehr statt
    Geschlossen,
}

/// Abonnement-Listen und Kodierung einer Session
///
/// Wird von der Befehlsverarbeitung mutiert und vom Event-Pusher gelesen,
/// deshalb hinter einem session-lokalen Lock.
#[derive(Debug, Default)]
struct AboListen {
    format: EventFormat,
    events: Vec<String>,
    custom_events: Vec<String>,
}

struct SessionInner {
    id: SessionId,
    passwort: String,
    start: Instant,
    start_zeit: DateTime<Utc>,
    zustand: parking_lot::Mutex<SessionZustand>,
    abos: parking_lot::Mutex<AboListen>,
    schreiber: tokio::sync::Mutex<OwnedWriteHalf>,
    schliessen_tx: watch::Sender<bool>,
}

impl SessionInner {
    /// Markiert die Session als geschlossen und weckt beide Schleifen
    fn schliessen(&self) {
        *self.zustand.lock() = SessionZustand::Geschlossen;
        let _ = self.schliessen_tx.send(true);
    }

    /// Schreibt eine Antwort; ein Schreibfehler schliesst die Session
    async fn antworten(&self, text: &str) -> bool {
        let mut schreiber = self.schreiber.lock().await;
        if let Err(e) = schreiber.write_all(text.as_bytes()).await {
            tracing::warn!(session = %self.id, fehler = %e, "Schreiben fehlgeschlagen");
            drop(schreiber);
            self.schliessen();
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// SchalterSession
// ---------------------------------------------------------------------------

/// Eine akzeptierte Event-Socket-Verbindung auf der Switch-Seite
#[derive(Clone)]
pub struct SchalterSession {
    inner: Arc<SessionInner>,
}

impl SchalterSession {
    /// Startet die Session auf einem frisch akzeptierten Stream
    ///
    /// Spawnt die Befehls- und die Event-Schleife; die Methode kehrt sofort
    /// zurueck. Die Session schickt als erstes die Auth-Aufforderung.
    pub fn starten(
        stream: TcpStream,
        passwort: String,
        ereignisse: mpsc::Receiver<Event>,
    ) -> Self {
        let (lese_haelfte, schreib_haelfte) = stream.into_split();
        let (schliessen_tx, schliessen_rx) = watch::channel(false);

        let inner = Arc::new(SessionInner {
            id: SessionId::new(),
            passwort,
            start: Instant::now(),
            start_zeit: Utc::now(),
            zustand: parking_lot::Mutex::new(SessionZustand::Unauthentifiziert),
            abos: parking_lot::Mutex::new(AboListen::default()),
            schreiber: tokio::sync::Mutex::new(schreib_haelfte),
            schliessen_tx,
        });

        tokio::spawn(befehls_schleife(
            Arc::clone(&inner),
            lese_haelfte,
            schliessen_rx.clone(),
        ));
        tokio::spawn(ereignis_schleife(
            Arc::clone(&inner),
            ereignisse,
            schliessen_rx,
        ));

        Self { inner }
    }

    /// Die ID dieser Session
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Der aktuelle Sessionzustand
    pub fn zustand(&self) -> SessionZustand {
        *self.inner.zustand.lock()
    }

    /// Gibt true zurueck solange die Session authentifiziert offen ist
    pub fn ist_offen(&self) -> bool {
        self.zustand() == SessionZustand::Offen
    }

    /// Prueft ob die Session ein Abonnement fuer den Schluessel haelt
    ///
    /// Zusammengesetzte Schluessel (`"CUSTOM x"`) werden gegen die
    /// Subclass-Liste geprueft, alle anderen gegen die Namensliste.
    pub fn hat_abo(&self, schluessel: &str) -> bool {
        let abos = self.inner.abos.lock();
        match schluessel.strip_prefix("CUSTOM ") {
            Some(subclass) => abos.custom_events.iter().any(|n| n == subclass),
            None => abos.events.iter().any(|n| n == schluessel),
        }
    }

    /// Stoppt die Session; beide Schleifen beenden sich umgehend
    pub fn stoppen(&self) {
        self.inner.schliessen();
    }
}

// ---------------------------------------------------------------------------
// Befehlsschleife
// ---------------------------------------------------------------------------

async fn befehls_schleife(
    inner: Arc<SessionInner>,
    lese_haelfte: OwnedReadHalf,
    mut schliessen_rx: watch::Receiver<bool>,
) {
    if !inner.antworten(antworten::AUTH_ANFRAGE).await {
        return;
    }

    let mut framed = FramedRead::new(lese_haelfte, KommandoCodec::new());
    let mut aufgaben = JoinSet::new();

    loop {
        tokio::select! {
            segment = framed.next() => {
                match segment {
                    Some(Ok(segment)) => {
                        // jedes Segment ist eine eigene Arbeitseinheit
                        let inner = Arc::clone(&inner);
                        aufgaben.spawn(befehl_verarbeiten(inner, segment));
                        while aufgaben.try_join_next().is_some() {}
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session = %inner.id, fehler = %e, "Lesefehler");
                        break;
                    }
                    None => {
                        tracing::debug!(session = %inner.id, "Verbindung vom Client getrennt");
                        break;
                    }
                }
            }
            Ok(()) = schliessen_rx.changed() => {
                if *schliessen_rx.borrow() {
                    break;
                }
            }
        }
    }

    inner.schliessen();
    // laufende Befehle geordnet zu Ende bringen, dann den Socket schliessen
    while aufgaben.join_next().await.is_some() {}
    let mut schreiber = inner.schreiber.lock().await;
    let _ = schreiber.shutdown().await;
    tracing::debug!(session = %inner.id, "Befehlsschleife beendet");
}

async fn befehl_verarbeiten(inner: Arc<SessionInner>, segment: String) {
    let zustand = *inner.zustand.lock();
    if zustand == SessionZustand::Geschlossen {
        return;
    }

    match Befehl::parsen(&segment) {
        Befehl::Auth { passwort } => {
            if passwort == inner.passwort {
                if inner.antworten(antworten::AUTH_AKZEPTIERT).await {
                    *inner.zustand.lock() = SessionZustand::Offen;
                    tracing::debug!(session = %inner.id, "Session authentifiziert");
                }
            } else {
                tracing::warn!(session = %inner.id, "Authentifizierung abgelehnt");
                inner.antworten(antworten::AUTH_ABGELEHNT).await;
                inner.antworten(&antworten::disconnect_hinweis()).await;
                inner.schliessen();
            }
        }
        Befehl::Exit => {
            inner.antworten(antworten::EXIT_BESTAETIGT).await;
            inner.antworten(&antworten::disconnect_hinweis()).await;
            inner.schliessen();
        }
        // alle weiteren Befehle erst nach der Authentifizierung
        _ if zustand != SessionZustand::Offen => {
            inner.antworten(antworten::BEFEHL_UNBEKANNT).await;
        }
        Befehl::Event {
            format,
            events,
            custom_events,
        } => {
            let mut abos = inner.abos.lock();
            abos.format = format;
            // doppelte Abonnements bleiben einfach: genau eine Zustellung
            // pro Event und Session
            for name in events {
                if !abos.events.contains(&name) {
                    abos.events.push(name);
                }
            }
            for name in custom_events {
                if !abos.custom_events.contains(&name) {
                    abos.custom_events.push(name);
                }
            }
        }
        Befehl::Status => {
            let text = status_text(inner.start.elapsed(), inner.start_zeit);
            inner.antworten(&antworten::api_antwort(&text)).await;
        }
        Befehl::Unbekannt(segment) => {
            tracing::debug!(session = %inner.id, segment = %segment, "Unbekanntes Kommando");
            inner.antworten(antworten::BEFEHL_UNBEKANNT).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Event-Pusher
// ---------------------------------------------------------------------------

async fn ereignis_schleife(
    inner: Arc<SessionInner>,
    mut ereignisse: mpsc::Receiver<Event>,
    mut schliessen_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            ereignis = ereignisse.recv() => {
                match ereignis {
                    Some(ereignis) => ereignis_pushen(&inner, ereignis).await,
                    None => break,
                }
            }
            Ok(()) = schliessen_rx.changed() => {
                if *schliessen_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(session = %inner.id, "Event-Schleife beendet");
}

/// Pusht ein Event wenn die Session es abonniert hat
///
/// Events mit `Event-Subclass` matchen gegen die Subclass-Liste, alle
/// anderen mit ihrem `Event-Name` gegen die Namensliste.
async fn ereignis_pushen(inner: &SessionInner, ereignis: Event) {
    let format = {
        let abos = inner.abos.lock();
        let passt = match ereignis.header(HEADER_EVENT_SUBCLASS) {
            Some(subclass) => abos.custom_events.iter().any(|n| n == subclass),
            None => ereignis
                .header(HEADER_EVENT_NAME)
                .map(|name| abos.events.iter().any(|n| n == name))
                .unwrap_or(false),
        };
        if !passt {
            return;
        }
        abos.format
    };

    if *inner.zustand.lock() != SessionZustand::Offen {
        return;
    }

    let gerendert = match format {
        EventFormat::Plain => ereignis.serialisieren_plain(),
        EventFormat::Json => match ereignis.serialisieren_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(session = %inner.id, fehler = %e, "Event-Serialisierung fehlgeschlagen");
                return;
            }
        },
    };
    inner
        .antworten(&antworten::event_nachricht(format, &gerendert))
        .await;
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Baut den freien Uptime-/Statistik-Text der `status`-Antwort
fn status_text(uptime: Duration, seit: DateTime<Utc>) -> String {
    let sekunden = uptime.as_secs();
    format!(
        "UP {} days, {} hours, {} minutes, {} seconds\n\
         Telegraph (Version {}) is ready, up since {}\n",
        sekunden / 86_400,
        (sekunden % 86_400) / 3_600,
        (sekunden % 3_600) / 60,
        sekunden % 60,
        env!("CARGO_PKG_VERSION"),
        seit.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
