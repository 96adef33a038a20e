//! Integrationstests der Schalter-Session gegen einen echten TCP-Socket
//!
//! Ein roher Test-Client spricht das Wire-Protokoll direkt, ohne den
//! Telegraph-Client – so wird die Peer-Seite isoliert geprueft.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;

use telegraph_core::Event;
use telegraph_protocol::antworten;
use telegraph_protocol::rahmen::{EslNachricht, NachrichtenCodec, BEFEHL_TRENNER};
use telegraph_protocol::{ereignis_aus_json, ereignis_aus_plain};
use telegraph_switch::SchalterServer;

const PASSWORT: &str = "ClueCon";
const FRIST: Duration = Duration::from_secs(5);

/// Roher Protokoll-Client fuer die Tests
struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
    codec: NachrichtenCodec,
}

impl TestClient {
    /// Verbindet und konsumiert die Auth-Aufforderung
    async fn verbinden(adresse: SocketAddr) -> Self {
        let stream = TcpStream::connect(adresse).await.expect("Verbindung");
        let mut client = Self {
            stream,
            buffer: BytesMut::new(),
            codec: NachrichtenCodec::new(),
        };
        let anfrage = client.nachricht().await;
        assert_eq!(
            anfrage.content_type(),
            Some(antworten::CONTENT_TYPE_AUTH_ANFRAGE)
        );
        client
    }

    /// Verbindet und authentifiziert sich
    async fn verbinden_und_anmelden(adresse: SocketAddr) -> Self {
        let mut client = Self::verbinden(adresse).await;
        client.senden(&format!("auth {PASSWORT}")).await;
        let antwort = client.nachricht().await;
        assert_eq!(antwort.header("Reply-Text"), Some("+OK accepted"));
        client
    }

    async fn senden(&mut self, befehl: &str) {
        self.stream
            .write_all(befehl.as_bytes())
            .await
            .expect("Senden");
        self.stream
            .write_all(BEFEHL_TRENNER)
            .await
            .expect("Senden des Trenners");
    }

    /// Naechste Nachricht; None bei EOF
    async fn nachricht_oder_eof(&mut self) -> Option<EslNachricht> {
        let lesen = async {
            loop {
                if let Some(nachricht) = self.codec.decode(&mut self.buffer).expect("Decode") {
                    return Some(nachricht);
                }
                let n = self
                    .stream
                    .read_buf(&mut self.buffer)
                    .await
                    .expect("Socket-Lesen");
                if n == 0 {
                    return None;
                }
            }
        };
        tokio::time::timeout(FRIST, lesen).await.expect("Zeitlimit")
    }

    async fn nachricht(&mut self) -> EslNachricht {
        self.nachricht_oder_eof()
            .await
            .expect("Nachricht erwartet, Strom beendet")
    }
}

/// Pollt eine Bedingung bis zur Frist
async fn warte_bis(beschreibung: &str, bedingung: impl Fn() -> bool) {
    let start = tokio::time::Instant::now();
    while !bedingung() {
        assert!(
            start.elapsed() < FRIST,
            "Zeitlimit beim Warten auf: {beschreibung}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn test_server() -> SchalterServer {
    SchalterServer::starten("127.0.0.1:0".parse().unwrap(), PASSWORT)
        .await
        .expect("Server-Start")
}

#[tokio::test]
async fn auth_und_status() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("status").await;
    let antwort = client.nachricht().await;
    assert_eq!(
        antwort.content_type(),
        Some(antworten::CONTENT_TYPE_API_ANTWORT)
    );
    let body = antwort.body.expect("Status-Body");
    assert!(!body.is_empty());
}

#[tokio::test]
async fn falsches_passwort_schliesst_die_session() {
    let server = test_server().await;
    let mut client = TestClient::verbinden(server.lokale_adresse()).await;

    client.senden("auth falsch").await;
    let abgelehnt = client.nachricht().await;
    assert_eq!(abgelehnt.header("Reply-Text"), Some("-ERR invalid"));

    let hinweis = client.nachricht().await;
    assert_eq!(
        hinweis.content_type(),
        Some(antworten::CONTENT_TYPE_DISCONNECT)
    );

    // danach beendet der Peer den Strom
    assert!(client.nachricht_oder_eof().await.is_none());
}

#[tokio::test]
async fn unbekanntes_kommando_laesst_die_session_offen() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("linger 30").await;
    let antwort = client.nachricht().await;
    assert_eq!(
        antwort.header("Reply-Text"),
        Some("-ERR command not found")
    );

    // die Session nimmt weiterhin Befehle an
    client.senden("status").await;
    let status = client.nachricht().await;
    assert_eq!(
        status.content_type(),
        Some(antworten::CONTENT_TYPE_API_ANTWORT)
    );
}

#[tokio::test]
async fn kommandos_vor_der_anmeldung_werden_abgelehnt() {
    let server = test_server().await;
    let mut client = TestClient::verbinden(server.lokale_adresse()).await;

    client.senden("event plain TEST").await;
    let antwort = client.nachricht().await;
    assert_eq!(
        antwort.header("Reply-Text"),
        Some("-ERR command not found")
    );
    assert_eq!(server.abo_anzahl("TEST"), 0);
}

#[tokio::test]
async fn plain_event_wird_gerahmt_gepusht() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("event plain TEST").await;
    let server_clone = server.clone();
    warte_bis("Abonnement registriert", move || {
        server_clone.abo_anzahl("TEST") == 1
    })
    .await;

    server.ereignis_senden(Event::mit_namen("TEST"));

    let push = client.nachricht().await;
    assert_eq!(
        push.content_type(),
        Some(antworten::CONTENT_TYPE_EVENT_PLAIN)
    );
    let body = push.body.clone().expect("Event-Body");
    // Content-Length zaehlt den Trailing-Newline mit
    assert!(body.ends_with('\n'));
    let laenge: usize = push.header("Content-Length").unwrap().parse().unwrap();
    assert_eq!(laenge, body.len());

    let event = ereignis_aus_plain(&body);
    assert_eq!(event.header("Event-Name"), Some("TEST"));
    // der Server stempelt seine Core-UUID
    assert_eq!(
        event.header("Core-UUID"),
        Some(server.core_uuid().to_string().as_str())
    );
}

#[tokio::test]
async fn custom_event_matcht_nur_ueber_die_subclass() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("event json CUSTOM test::test").await;
    let server_clone = server.clone();
    warte_bis("Abonnement registriert", move || {
        server_clone.abo_anzahl("CUSTOM test::test") == 1
    })
    .await;

    // ein nicht abonniertes Plain-Event darf nicht zugestellt werden
    server.ereignis_senden(Event::mit_namen("HEARTBEAT"));
    server.ereignis_senden(Event::mit_namen("CUSTOM test::test"));

    let push = client.nachricht().await;
    assert_eq!(
        push.content_type(),
        Some(antworten::CONTENT_TYPE_EVENT_JSON)
    );
    let body = push.body.expect("Event-Body");
    let event = ereignis_aus_json(body.trim_end_matches('\n')).expect("JSON-Event");
    assert_eq!(
        event.abo_schluessel().as_deref(),
        Some("CUSTOM test::test")
    );
}

#[tokio::test]
async fn doppeltes_abonnement_liefert_genau_einmal() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("event plain TEST").await;
    client.senden("event plain TEST ZWEITES").await;
    let server_clone = server.clone();
    warte_bis("Abonnements registriert", move || {
        server_clone.abo_anzahl("ZWEITES") == 1
    })
    .await;

    server.ereignis_senden(Event::mit_namen("TEST"));
    server.ereignis_senden(Event::mit_namen("ZWEITES"));

    // pro Event genau ein Push; die Reihenfolge innerhalb der Session bleibt
    let erster = ereignis_aus_plain(&client.nachricht().await.body.unwrap());
    assert_eq!(erster.header("Event-Name"), Some("TEST"));
    let zweiter = ereignis_aus_plain(&client.nachricht().await.body.unwrap());
    assert_eq!(zweiter.header("Event-Name"), Some("ZWEITES"));
}

#[tokio::test]
async fn abo_kommando_ohne_namen_ist_ein_noop() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("event plain TEST").await;
    let server_clone = server.clone();
    warte_bis("Abonnement registriert", move || {
        server_clone.abo_anzahl("TEST") == 1
    })
    .await;

    // kein Fehler, bestehende Abonnements bleiben unveraendert
    client.senden("event plain").await;
    client.senden("status").await;
    let status = client.nachricht().await;
    assert_eq!(
        status.content_type(),
        Some(antworten::CONTENT_TYPE_API_ANTWORT)
    );
    assert_eq!(server.abo_anzahl("TEST"), 1);
}

#[tokio::test]
async fn exit_beendet_die_session_geordnet() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    client.senden("exit").await;
    let antwort = client.nachricht().await;
    assert_eq!(antwort.header("Reply-Text"), Some("+OK bye"));
    let hinweis = client.nachricht().await;
    assert_eq!(
        hinweis.content_type(),
        Some(antworten::CONTENT_TYPE_DISCONNECT)
    );
    assert!(client.nachricht_oder_eof().await.is_none());
}

#[tokio::test]
async fn server_stoppen_laesst_bestehende_sessions_leben() {
    let server = test_server().await;
    let mut client = TestClient::verbinden_und_anmelden(server.lokale_adresse()).await;

    server.stoppen();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // neue Verbindungen scheitern, die bestehende antwortet weiter
    assert!(TcpStream::connect(server.lokale_adresse()).await.is_err());
    client.senden("status").await;
    let status = client.nachricht().await;
    assert_eq!(
        status.content_type(),
        Some(antworten::CONTENT_TYPE_API_ANTWORT)
    );
}
