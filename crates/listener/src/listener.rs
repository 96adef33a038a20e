//! EventListener – Session-Registry, Handler-Tabelle und Dispatcher
//!
//! Der Listener haelt beide Strukturen gegenseitig konsistent: jede
//! Session ist auf jeden registrierten Schluessel abonniert, und jeder
//! neue Handler wird auf jede offene Session rueckpropagiert.
//!
//! ## Dispatch
//! Eine Dispatch-Schleife blockiert auf dem gemeinsamen Event-Kanal aller
//! Sessions (bzw. dem Stop-Signal). Pro Event wird der Abo-Schluessel
//! berechnet und jeder passende Handler als eigene Arbeitseinheit in ein
//! begrenztes `JoinSet` gegeben – eine Handler-Panik erreicht die Schleife
//! nicht, und beim Beenden werden alle laufenden Aufrufe gejoint.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use telegraph_client::{EslLeser, EslSender};
use telegraph_core::{Event, SessionId};
use telegraph_protocol::EventFormat;

use crate::fehler::{ListenerFehler, ListenerResult};
use crate::handler::{EventHandler, Handler};
use crate::verbindung::EslVerbindung;

/// Groesse des gemeinsamen Event-Kanals aller Sessions
const EREIGNIS_KANAL_GROESSE: usize = 256;

/// Obergrenze gleichzeitig laufender Handler-Aufrufe
const MAX_GLEICHZEITIGE_HANDLER: usize = 64;

struct ListenerInner {
    format: EventFormat,
    verbindungen: DashMap<SessionId, Arc<EslVerbindung>>,
    handler: RwLock<Vec<EventHandler>>,
    ereignisse_tx: mpsc::Sender<Event>,
    stoppen_tx: watch::Sender<bool>,
}

/// Der Event-Listener: aggregiert beliebig viele Switch-Verbindungen zu
/// einem Entscheidungspunkt und stellt Events an registrierte Handler zu
///
/// Thread-safe via Arc. Clone teilt den inneren Zustand. Muss innerhalb
/// einer tokio-Runtime erstellt werden (die Dispatch-Schleife wird sofort
/// gespawnt).
#[derive(Clone)]
pub struct EventListener {
    inner: Arc<ListenerInner>,
}

impl EventListener {
    /// Erstellt einen Listener mit JSON-Abonnements
    pub fn neu() -> Self {
        Self::mit_format(EventFormat::Json)
    }

    /// Erstellt einen Listener mit der gewuenschten Event-Kodierung
    pub fn mit_format(format: EventFormat) -> Self {
        let (ereignisse_tx, ereignisse_rx) = mpsc::channel(EREIGNIS_KANAL_GROESSE);
        let (stoppen_tx, stoppen_rx) = watch::channel(false);

        let inner = Arc::new(ListenerInner {
            format,
            verbindungen: DashMap::new(),
            handler: RwLock::new(Vec::new()),
            ereignisse_tx,
            stoppen_tx,
        });

        tokio::spawn(dispatch_schleife(
            Arc::clone(&inner),
            ereignisse_rx,
            stoppen_rx,
        ));
        Self { inner }
    }

    /// Oeffnet eine neue Switch-Verbindung und nimmt sie in die Registry auf
    ///
    /// Verbindet, authentifiziert und abonniert jeden bereits registrierten
    /// Schluessel. Nur Fehler des synchronen Anteils (Verbindungsaufbau,
    /// Handshake) werden gemeldet; ein fehlgeschlagenes initiales Abonnement
    /// wird pro Session geloggt und verschluckt – wer Garantien braucht,
    /// abonniert explizit via [`ereignis_abonnieren`](Self::ereignis_abonnieren).
    pub async fn verbindung_oeffnen(
        &self,
        host: &str,
        passwort: &str,
        port: u16,
        timeout: Duration,
    ) -> ListenerResult<SessionId> {
        let (sender, leser) = telegraph_client::verbinden(host, port, passwort, timeout).await?;
        Ok(self
            .verbindung_aufnehmen(Arc::new(sender), Box::new(leser))
            .await)
    }

    /// Nimmt eine bereits aufgebaute Verbindung in die Registry auf
    ///
    /// Die Naht fuer alternative Transportwege: alles was die
    /// Collaborator-Traits erfuellt, kann Sessions stellen.
    pub async fn verbindung_aufnehmen(
        &self,
        sender: Arc<dyn EslSender>,
        leser: Box<dyn EslLeser>,
    ) -> SessionId {
        let verbindung = EslVerbindung::starten(sender, leser, self.inner.ereignisse_tx.clone());
        let id = verbindung.id();
        self.inner.verbindungen.insert(id, Arc::clone(&verbindung));

        // jede neue Session wird auf jeden registrierten Schluessel abonniert
        let schluessel: Vec<String> = {
            let handler = self.inner.handler.read();
            handler.iter().map(|h| h.schluessel.clone()).collect()
        };
        for eintrag in schluessel {
            if let Err(e) = verbindung.abonnieren(self.inner.format, &eintrag).await {
                tracing::warn!(
                    session = %id,
                    schluessel = %eintrag,
                    fehler = %e,
                    "Initiales Abonnement fehlgeschlagen"
                );
            }
        }

        tracing::info!(session = %id, "Event-Socket-Verbindung aufgenommen");
        id
    }

    /// Registriert einen Handler und abonniert seinen Schluessel ueberall
    ///
    /// Gibt die pro Session aufgetretenen Abonnement-Fehler zurueck; eine
    /// leere Liste bedeutet vollen Erfolg. Ein Fehler auf einer Session
    /// bricht die Registrierung fuer die uebrigen nie ab.
    pub async fn handler_hinzufuegen(
        &self,
        schluessel: impl Into<String>,
        handler: Handler,
    ) -> Vec<ListenerFehler> {
        let schluessel = schluessel.into();
        self.inner
            .handler
            .write()
            .push(EventHandler::neu(schluessel.clone(), handler));
        self.abo_verbreiten(&schluessel).await
    }

    /// Abonniert einen Schluessel auf jeder registrierten Session
    ///
    /// Best-effort: jede Session wird unabhaengig versucht, Fehler werden
    /// gesammelt zurueckgegeben.
    pub async fn abo_verbreiten(&self, schluessel: &str) -> Vec<ListenerFehler> {
        let verbindungen: Vec<Arc<EslVerbindung>> = self
            .inner
            .verbindungen
            .iter()
            .map(|eintrag| Arc::clone(eintrag.value()))
            .collect();

        let mut fehler = Vec::new();
        for verbindung in verbindungen {
            if let Err(e) = verbindung.abonnieren(self.inner.format, schluessel).await {
                tracing::warn!(
                    session = %verbindung.id(),
                    schluessel,
                    fehler = %e,
                    "Abonnement fehlgeschlagen"
                );
                fehler.push(ListenerFehler::Abonnement {
                    session: verbindung.id(),
                    quelle: e,
                });
            }
        }
        fehler
    }

    /// Abonniert einen Schluessel auf einer einzelnen Session
    pub async fn ereignis_abonnieren(
        &self,
        session: SessionId,
        schluessel: &str,
    ) -> ListenerResult<()> {
        let verbindung = self
            .inner
            .verbindungen
            .get(&session)
            .map(|eintrag| Arc::clone(eintrag.value()))
            .ok_or(ListenerFehler::UnbekannteSession(session))?;
        verbindung
            .abonnieren(self.inner.format, schluessel)
            .await
            .map_err(|quelle| ListenerFehler::Abonnement { session, quelle })
    }

    /// Gibt true zurueck solange die Session lebt
    ///
    /// Asynchrone Ausfaelle (eine spaeter sterbende Session) sind nur
    /// hierueber beobachtbar.
    pub fn ist_aktiv(&self, session: SessionId) -> bool {
        self.inner
            .verbindungen
            .get(&session)
            .map(|verbindung| verbindung.ist_aktiv())
            .unwrap_or(false)
    }

    /// Stoppt eine einzelne Session
    pub fn verbindung_stoppen(&self, session: SessionId) {
        if let Some(verbindung) = self.inner.verbindungen.get(&session) {
            verbindung.stoppen();
        }
    }

    /// Beendet die Dispatch-Schleife
    ///
    /// Bereits aufgenommene Sessions werden dadurch nicht gestoppt; sie
    /// sind einzeln via [`verbindung_stoppen`](Self::verbindung_stoppen)
    /// zu beenden.
    pub fn stoppen(&self) {
        let _ = self.inner.stoppen_tx.send(true);
    }

    /// Anzahl der registrierten Sessions
    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    /// Anzahl der registrierten Handler-Eintraege
    pub fn handler_anzahl(&self) -> usize {
        self.inner.handler.read().len()
    }
}

impl Default for EventListener {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Dispatch-Schleife
// ---------------------------------------------------------------------------

async fn dispatch_schleife(
    inner: Arc<ListenerInner>,
    mut ereignisse: mpsc::Receiver<Event>,
    mut stoppen_rx: watch::Receiver<bool>,
) {
    let mut aufgaben: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            ereignis = ereignisse.recv() => {
                match ereignis {
                    Some(ereignis) => verteilen(&inner, ereignis, &mut aufgaben).await,
                    None => break,
                }
            }
            Ok(()) = stoppen_rx.changed() => {
                if *stoppen_rx.borrow() {
                    break;
                }
            }
        }
    }

    // alle laufenden Handler-Aufrufe geordnet beenden
    while let Some(ergebnis) = aufgaben.join_next().await {
        panik_loggen(ergebnis);
    }
    tracing::debug!("Dispatch-Schleife beendet");
}

/// Stellt ein Event an jeden Handler mit passendem Schluessel zu
async fn verteilen(inner: &ListenerInner, ereignis: Event, aufgaben: &mut JoinSet<()>) {
    let Some(schluessel) = ereignis.abo_schluessel() else {
        tracing::debug!("Event ohne Event-Name verworfen");
        return;
    };

    // Snapshot der Handler-Tabelle; das Lock wird nie ueber einen
    // Handler-Aufruf gehalten
    let passende: Vec<Handler> = {
        let handler = inner.handler.read();
        handler
            .iter()
            .filter(|eintrag| eintrag.schluessel == schluessel)
            .map(|eintrag| Arc::clone(&eintrag.handler))
            .collect()
    };
    if passende.is_empty() {
        return;
    }

    let ereignis = Arc::new(ereignis);
    for handler in passende {
        // bei voller Auslastung zuerst einen Platz freigeben
        while aufgaben.len() >= MAX_GLEICHZEITIGE_HANDLER {
            if let Some(ergebnis) = aufgaben.join_next().await {
                panik_loggen(ergebnis);
            }
        }
        let ereignis = Arc::clone(&ereignis);
        aufgaben.spawn(async move { (handler)(ereignis) });
        while let Some(ergebnis) = aufgaben.try_join_next() {
            panik_loggen(ergebnis);
        }
    }
}

fn panik_loggen(ergebnis: Result<(), tokio::task::JoinError>) {
    if let Err(e) = ergebnis {
        if e.is_panic() {
            tracing::error!(fehler = %e, "Panik in einem Event-Handler");
        }
    }
}
