//! Event-Record – die kanonische In-Memory-Darstellung einer Notification
//!
//! Ein Event besteht aus einer geordneten Header-Liste und einem optionalen
//! Body. Header-Namen muessen nicht eindeutig sein; Lookups liefern den
//! ERSTEN Treffer. Die Einfuegereihenfolge bleibt erhalten, weil die
//! Plain-Serialisierung darauf aufbaut.
//!
//! ## Abo-Schluessel
//! Der Schluessel fuer das Handler-Matching ist der Wert des
//! `Event-Name`-Headers. Traegt ein Event den generischen Namen `CUSTOM`,
//! ist der Schluessel der zusammengesetzte String
//! `"CUSTOM " + Event-Subclass`. Jede Zustellentscheidung im System haengt
//! an dieser Regel.

use serde_json::{Map, Value};

use crate::error::Result;

/// Header-Name des Event-Typs
pub const HEADER_EVENT_NAME: &str = "Event-Name";
/// Header-Name der herstellerspezifischen Subklasse
pub const HEADER_EVENT_SUBCLASS: &str = "Event-Subclass";
/// Der generische Event-Name fuer subklassifizierte Events
pub const EVENT_NAME_CUSTOM: &str = "CUSTOM";

/// Eine einzelne Event-Notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Geordnete (Name, Wert)-Paare; Lookup liefert den ersten Treffer
    headers: Vec<(String, String)>,
    /// Optionaler Payload; leer = kein Body
    body: String,
}

impl Event {
    /// Erstellt ein leeres Event
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erstellt ein Event aus einem Abo-Schluessel
    ///
    /// Akzeptiert sowohl einfache Event-Namen (`"HEARTBEAT"`) als auch den
    /// zusammengesetzten Schluessel (`"CUSTOM sofia::register"`), der in
    /// `Event-Name` + `Event-Subclass` zerlegt wird.
    pub fn mit_namen(schluessel: &str) -> Self {
        let mut event = Self::neu();
        match schluessel.strip_prefix("CUSTOM ") {
            Some(subclass) if !subclass.trim().is_empty() => {
                event.header_setzen(HEADER_EVENT_NAME, EVENT_NAME_CUSTOM);
                event.header_setzen(HEADER_EVENT_SUBCLASS, subclass.trim());
            }
            _ => {
                event.header_setzen(HEADER_EVENT_NAME, schluessel);
            }
        }
        event
    }

    /// Gibt den Wert des ersten Headers mit diesem Namen zurueck
    ///
    /// Der Vergleich ist case-sensitiv und exakt. Ein fehlender Header ist
    /// `None`, nie ein Fehler – Aufrufer muessen explizit verzweigen.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Setzt einen Header: ersetzt den ersten vorhandenen, sonst Anhang
    pub fn header_setzen(&mut self, name: impl Into<String>, wert: impl Into<String>) {
        let name = name.into();
        let wert = wert.into();
        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some(eintrag) => eintrag.1 = wert,
            None => self.headers.push((name, wert)),
        }
    }

    /// Haengt einen Header unbedingt ans Ende an
    ///
    /// Anders als [`header_setzen`](Self::header_setzen) wird ein
    /// vorhandener gleichnamiger Header nicht ersetzt – Frame-Parser
    /// brauchen das, weil eingehende Events doppelte Namen tragen duerfen.
    pub fn header_anhaengen(&mut self, name: impl Into<String>, wert: impl Into<String>) {
        self.headers.push((name.into(), wert.into()));
    }

    /// Haengt Text an den Body an (ohne Trennzeichen)
    pub fn body_anhaengen(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// Gibt den Body zurueck (leer = kein Body)
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Gibt true zurueck wenn das Event einen Body traegt
    pub fn hat_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Iteriert ueber alle Header in Einfuegereihenfolge
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Berechnet den Abo-Schluessel des Events
    ///
    /// `None` wenn kein `Event-Name`-Header vorhanden ist. Ein `CUSTOM`-Event
    /// ohne Subclass-Header ergibt den nackten Schluessel `"CUSTOM"`.
    pub fn abo_schluessel(&self) -> Option<String> {
        let name = self.header(HEADER_EVENT_NAME)?;
        if name != EVENT_NAME_CUSTOM {
            return Some(name.to_string());
        }
        match self.header(HEADER_EVENT_SUBCLASS) {
            Some(subclass) => Some(format!("{EVENT_NAME_CUSTOM} {subclass}")),
            None => Some(EVENT_NAME_CUSTOM.to_string()),
        }
    }

    /// Serialisiert das Event als Plain-Text
    ///
    /// Header als `"Name: wert\n"` in Einfuegereihenfolge; bei vorhandenem
    /// Body folgt `"Content-Length: <laenge>\n\n" + body`.
    pub fn serialisieren_plain(&self) -> String {
        let mut ergebnis = String::new();
        for (name, wert) in &self.headers {
            ergebnis.push_str(name);
            ergebnis.push_str(": ");
            ergebnis.push_str(wert);
            ergebnis.push('\n');
        }
        if self.hat_body() {
            ergebnis.push_str(&format!("Content-Length: {}\n\n", self.body.len()));
            ergebnis.push_str(&self.body);
        }
        ergebnis
    }

    /// Serialisiert das Event als JSON-Objekt
    ///
    /// Header-Namen werden zu Schluesseln, der Body landet unter `"body"`.
    /// Die Schluessel-Reihenfolge ist undefiniert – Konsumenten duerfen sich
    /// bei dieser Kodierung nicht auf sie verlassen.
    pub fn serialisieren_json(&self) -> Result<String> {
        let mut objekt = Map::new();
        for (name, wert) in &self.headers {
            objekt.insert(name.clone(), Value::String(wert.clone()));
        }
        if self.hat_body() {
            objekt.insert("body".into(), Value::String(self.body.clone()));
        }
        Ok(serde_json::to_string(&Value::Object(objekt))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schluessel_fuer_einfaches_event() {
        let event = Event::mit_namen("HEARTBEAT");
        assert_eq!(event.abo_schluessel().as_deref(), Some("HEARTBEAT"));
    }

    #[test]
    fn schluessel_fuer_custom_event() {
        let event = Event::mit_namen("CUSTOM sofia::register");
        assert_eq!(event.header(HEADER_EVENT_NAME), Some("CUSTOM"));
        assert_eq!(event.header(HEADER_EVENT_SUBCLASS), Some("sofia::register"));
        assert_eq!(
            event.abo_schluessel().as_deref(),
            Some("CUSTOM sofia::register")
        );
    }

    #[test]
    fn name_mit_custom_praefix_bleibt_einfacher_name() {
        let event = Event::mit_namen("CUSTOMIZED");
        assert_eq!(event.header(HEADER_EVENT_NAME), Some("CUSTOMIZED"));
        assert_eq!(event.header(HEADER_EVENT_SUBCLASS), None);
    }

    #[test]
    fn schluessel_fuer_custom_ohne_subclass() {
        let mut event = Event::neu();
        event.header_setzen(HEADER_EVENT_NAME, "CUSTOM");
        assert_eq!(event.abo_schluessel().as_deref(), Some("CUSTOM"));
    }

    #[test]
    fn schluessel_ohne_event_name() {
        let event = Event::neu();
        assert_eq!(event.abo_schluessel(), None);
    }

    #[test]
    fn header_lookup_liefert_ersten_treffer() {
        let mut event = Event::neu();
        event.header_anhaengen("X-Doppelt", "eins");
        event.header_anhaengen("X-Doppelt", "zwei");
        assert_eq!(event.header("X-Doppelt"), Some("eins"));
        assert_eq!(event.headers().count(), 2);
    }

    #[test]
    fn header_lookup_ist_case_sensitiv() {
        let event = Event::mit_namen("TEST");
        assert_eq!(event.header("event-name"), None);
        assert_eq!(event.header(HEADER_EVENT_NAME), Some("TEST"));
    }

    #[test]
    fn header_setzen_ersetzt_oder_haengt_an() {
        let mut event = Event::neu();
        event.header_setzen("Core-UUID", "a");
        event.header_setzen("Core-UUID", "b");
        assert_eq!(event.header("Core-UUID"), Some("b"));
        assert_eq!(event.headers().count(), 1);

        event.header_setzen("Anderer", "c");
        assert_eq!(event.headers().count(), 2);
    }

    #[test]
    fn body_anhaengen_ohne_trennzeichen() {
        let mut event = Event::neu();
        assert!(!event.hat_body());
        event.body_anhaengen("Hallo");
        event.body_anhaengen("Welt");
        assert_eq!(event.body(), "HalloWelt");
    }

    #[test]
    fn plain_serialisierung_ohne_body() {
        let mut event = Event::mit_namen("TEST");
        event.header_setzen("Core-UUID", "abc");
        assert_eq!(
            event.serialisieren_plain(),
            "Event-Name: TEST\nCore-UUID: abc\n"
        );
    }

    #[test]
    fn plain_serialisierung_mit_body() {
        let mut event = Event::mit_namen("TEST");
        event.body_anhaengen("Inhalt");
        assert_eq!(
            event.serialisieren_plain(),
            "Event-Name: TEST\nContent-Length: 6\n\nInhalt"
        );
    }

    #[test]
    fn json_serialisierung_enthaelt_header_und_body() {
        let mut event = Event::mit_namen("TEST");
        event.body_anhaengen("Inhalt");
        let json = event.serialisieren_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["Event-Name"], "TEST");
        assert_eq!(wert["body"], "Inhalt");
    }

    #[test]
    fn json_serialisierung_ohne_body_hat_keinen_body_schluessel() {
        let event = Event::mit_namen("TEST");
        let json = event.serialisieren_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(wert.get("body").is_none());
    }
}
