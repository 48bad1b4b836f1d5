use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::{spawn, task};
use tokio::sync::{mpsc, watch};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, trace};

use crate::errors::{Result, TelloError};

pub const STATE_UDP_PORT:u16 = 8890;

// the drone streams at ~10Hz, so this only fires when it has gone quiet
const RECEIVE_TIMEOUT:Duration = Duration::from_secs(5);
const ERROR_BACKOFF:Duration = Duration::from_millis(100);
const MAX_DATAGRAM_SIZE:usize = 1024;

pub type TelloStateSender = mpsc::UnboundedSender<TelloState>;
pub type TelloStateReceiver = mpsc::UnboundedReceiver<TelloState>;

pub fn make_tello_state_channel() -> (TelloStateSender, TelloStateReceiver) {
    mpsc::unbounded_channel()
}

/// Splits a raw state datagram into lower-cased key/value pairs.
///
/// Example message:
/// "mid:-1;x:-100;y:-100;z:-100;mpry:-1,-1,-1;pitch:0;roll:0;yaw:-3;vgx:0;vgy:0;vgz:1;templ:58;temph:60;tof:71;h:50;bat:82;baro:-57.14;time:14;agx:17.00;agy:-4.00;agz:-956.00;"
///
/// Items without a `:` (or with an empty key) are dropped, the rest of the
/// datagram is still used.
pub fn parse_message(s: &str) -> Vec<(String, String)> {
    s.trim()
        .split(';')
        .filter_map(|item| {
            let (k, v) = item.split_once(':')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_lowercase(), v.trim().to_string()))
        })
        .collect()
}

/// Last seen value of every telemetry key.
///
/// Keys are case-insensitive and never removed, only overwritten. Clones share
/// the same storage, so the listener task writes while any number of readers
/// look on from other tasks or threads.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    values: Arc<RwLock<HashMap<String, String>>>
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every well-formed item of a state datagram, returning how many
    /// were applied.
    pub fn update_from_message(&self, message: &str) -> usize {
        let items = parse_message(message);
        let n = items.len();
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        for (k, v) in items {
            values.insert(k, v);
        }
        n
    }

    pub fn insert(&self, key: &str, value: &str) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.trim().to_lowercase(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(&key.trim().to_lowercase()).cloned()
    }

    /// Parses the current value of `key`, failing if it is missing or malformed.
    pub fn get_as<T: FromStr>(&self, key: &str) -> Result<T> {
        let v = self.get(key).ok_or_else(|| TelloError::ParseError { msg: format!("no value for {key}") })?;
        value_as(&v)
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every key and value currently held.
    pub fn entries(&self) -> HashMap<String, String> {
        self.values.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Height above the takeoff point in cm.
    pub fn height(&self) -> Option<i16> {
        self.get_as("h").ok()
    }

    /// Battery charge in percent.
    pub fn battery(&self) -> Option<u8> {
        self.get_as("bat").ok()
    }

    /// Barometer altitude in cm.
    pub fn barometer(&self) -> Option<f32> {
        self.get_as("baro").ok()
    }

    /// Motor on time in seconds.
    pub fn flight_time(&self) -> Option<u16> {
        self.get_as("time").ok()
    }

    /// Time-of-flight distance sensor reading in cm.
    pub fn time_of_flight(&self) -> Option<u16> {
        self.get_as("tof").ok()
    }

    /// Lowest and highest board temperature in °C.
    pub fn temperature(&self) -> Option<(i16, i16)> {
        Some((self.get_as("templ").ok()?, self.get_as("temph").ok()?))
    }

    pub fn state(&self) -> TelloState {
        TelloState::from_values(&self.entries())
    }
}

/// The live state of the drone.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TelloState {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub height: i16,
    pub barometer: f32,
    pub battery: u8,
    pub time_of_flight: u16,
    pub motor_time: u16,
    pub temperature_low: i16,
    pub temperature_high: i16,
    pub velocity: Vector3<i16>,
    pub acceleration: Vector3<f32>
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T
}

impl TelloState {
    /// Builds a state from a raw datagram. Missing or malformed fields keep
    /// their default value.
    pub fn from_message(s: &str) -> TelloState {
        TelloState::from_values(&parse_message(s).into_iter().collect())
    }

    fn from_values(values: &HashMap<String, String>) -> TelloState {
        let mut state = TelloState::default();

        for (k, v) in values {
            match k.as_str() {
                "roll" => set(&mut state.roll, v),
                "pitch" => set(&mut state.pitch, v),
                "yaw" => set(&mut state.yaw, v),
                "h" => set(&mut state.height, v),
                "baro" => set(&mut state.barometer, v),
                "bat" => set(&mut state.battery, v),
                "tof" => set(&mut state.time_of_flight, v),
                "time" => set(&mut state.motor_time, v),
                "templ" => set(&mut state.temperature_low, v),
                "temph" => set(&mut state.temperature_high, v),
                "vgx" => set(&mut state.velocity.x, v),
                "vgy" => set(&mut state.velocity.y, v),
                "vgz" => set(&mut state.velocity.z, v),
                "agx" => set(&mut state.acceleration.x, v),
                "agy" => set(&mut state.acceleration.y, v),
                "agz" => set(&mut state.acceleration.z, v),
                _ => {}
            }
        }

        state
    }
}

fn set<T: FromStr>(field: &mut T, s: &str) {
    if let Ok(v) = value_as(s) {
        *field = v;
    }
}

fn value_as<T: FromStr>(s: &str) -> Result<T> {
    s.parse::<T>().map_err(|_| TelloError::ParseError { msg: s.to_string() })
}

/// Background task feeding the telemetry cache from the drone's state
/// datagrams, for as long as the connection lasts.
#[derive(Debug)]
pub(crate) struct StateListener {
    stop: watch::Sender<bool>,
    task: task::JoinHandle<()>,
    local_address: SocketAddr
}

impl StateListener {
    pub(crate) async fn start_listening(address: &str, cache: TelemetryCache, sender: Option<TelloStateSender>) -> Result<Self> {
        info!("[State] START LISTENING at {address}");

        let sock = UdpSocket::bind(address).await?;
        let local_address = sock.local_addr()?;
        let (stop, mut stop_rx) = watch::channel(false);

        let task = spawn(async move {
            let mut buf = vec![0; MAX_DATAGRAM_SIZE];
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    r = timeout(RECEIVE_TIMEOUT, sock.recv(&mut buf)) => match r {
                        Ok(Ok(n)) => {
                            let raw_state = String::from_utf8_lossy(&buf[..n]);
                            let applied = cache.update_from_message(&raw_state);
                            trace!("[State] {applied} values from {n} bytes");

                            if let Some(sender) = &sender {
                                // nobody listening any more is fine
                                let _ = sender.send(TelloState::from_message(&raw_state));
                            }
                        }
                        Ok(Err(err)) => {
                            debug!("[State] receive failed ({err}), carrying on");
                            sleep(ERROR_BACKOFF).await;
                        }
                        Err(_) => {
                            debug!("[State] nothing received for {RECEIVE_TIMEOUT:?}");
                        }
                    }
                }
            }
            // the socket goes with the task
            drop(sock);
            debug!("[State] socket closed");
        });

        Ok(Self { stop, task, local_address })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_address
    }

    pub(crate) async fn stop_listening(self) -> Result<()> {
        info!("[State] STOP LISTENING");
        let _ = self.stop.send(true);
        self.task.await.map_err(|e| TelloError::Generic { msg: format!("state listener failed - {e}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE:&str = "mid:-1;x:-100;y:-100;z:-100;mpry:-1,-1,-1;pitch:0;roll:0;yaw:-3;vgx:0;vgy:0;vgz:1;templ:58;temph:60;tof:71;h:50;bat:82;baro:-57.14;time:14;agx:17.00;agy:-4.00;agz:-956.00;\r\n";

    #[test]
    fn parses_full_datagram() {
        let cache = TelemetryCache::new();
        assert_eq!(cache.update_from_message(SAMPLE), 21);

        assert_eq!(cache.height(), Some(50));
        assert_eq!(cache.battery(), Some(82));
        assert_eq!(cache.barometer(), Some(-57.14));
        assert_eq!(cache.temperature(), Some((58, 60)));
        assert_eq!(cache.get("mpry").as_deref(), Some("-1,-1,-1"));
        assert_eq!(cache.get("agz").as_deref(), Some("-956.00"));
    }

    #[test]
    fn malformed_item_does_not_spoil_the_rest() {
        let cache = TelemetryCache::new();
        cache.update_from_message("h:30;bat;tof:12;:7;");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.height(), Some(30));
        assert_eq!(cache.time_of_flight(), Some(12));
        assert_eq!(cache.get("bat"), None);
    }

    #[test]
    fn same_datagram_twice_is_same_state() {
        let once = TelemetryCache::new();
        once.update_from_message(SAMPLE);

        let twice = TelemetryCache::new();
        twice.update_from_message(SAMPLE);
        twice.update_from_message(SAMPLE);

        assert_eq!(once.entries(), twice.entries());
    }

    #[test]
    fn keys_are_case_insensitive_and_last_write_wins() {
        let cache = TelemetryCache::new();
        cache.update_from_message("BAT:90;templ:40");
        cache.update_from_message("bat:89");

        assert_eq!(cache.get("Bat").as_deref(), Some("89"));
        // not in the latest datagram, but never removed
        assert_eq!(cache.get("templ").as_deref(), Some("40"));
    }

    #[test]
    fn unknown_keys_are_kept() {
        let cache = TelemetryCache::new();
        cache.update_from_message("sn:0TQZH;");
        assert_eq!(cache.get("sn").as_deref(), Some("0TQZH"));
    }

    #[test]
    fn value_only_split_on_first_colon() {
        assert_eq!(parse_message("t:12:30:01"), vec![("t".to_string(), "12:30:01".to_string())]);
    }

    #[test]
    fn typed_access_reports_bad_values() {
        let cache = TelemetryCache::new();
        cache.insert("bat", "lots");

        assert!(matches!(cache.get_as::<u8>("bat"), Err(TelloError::ParseError { .. })));
        assert!(matches!(cache.get_as::<u8>("h"), Err(TelloError::ParseError { .. })));
        assert_eq!(cache.battery(), None);
    }

    #[test]
    fn snapshot_from_cache() {
        let cache = TelemetryCache::new();
        cache.update_from_message(SAMPLE);
        let state = cache.state();

        assert_eq!(state.yaw, -3);
        assert_eq!(state.velocity.z, 1);
        assert_eq!(state.acceleration.x, 17.0);
        assert_eq!(state, TelloState::from_message(SAMPLE));
    }

    #[tokio::test]
    async fn listener_fills_cache_and_stops() {
        let cache = TelemetryCache::new();
        let (tx, mut rx) = make_tello_state_channel();
        let listener = StateListener::start_listening("127.0.0.1:0", cache.clone(), Some(tx)).await.unwrap();

        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        drone.send_to(b"h:42;bat:77;", listener.local_addr()).await.unwrap();

        let state = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(state.height, 42);
        assert_eq!(cache.battery(), Some(77));

        timeout(Duration::from_secs(2), listener.stop_listening()).await.unwrap().unwrap();
    }
}
