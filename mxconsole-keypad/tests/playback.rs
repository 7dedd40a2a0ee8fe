//! Keypad interface and playback tests against a recording transport.
//!
//! The hardware test at the bottom needs a real keypad.
//! Run with: cargo test -p mxconsole-keypad --test playback -- --ignored --nocapture

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mxconsole_keypad::{
    jpeg, Animation, AnimationFrame, KeySlot, KeypadError, KeypadInterface, KeypadSettings,
    PlaybackState, Rgb,
};
use mxconsole_transport::lcd::{packet_count, ImageHeader};
use mxconsole_transport::protocol::{init, lcd};
use mxconsole_transport::{
    ControlByte, DeviceKind, KeypadEvent, Transport, TransportDeviceInfo, TransportError,
    VENDOR_ID,
};
use parking_lot::Mutex;

/// Transport that records every write and replays queued input events
struct RecordingTransport {
    info: TransportDeviceInfo,
    writes: Mutex<Vec<Vec<u8>>>,
    events: Mutex<VecDeque<KeypadEvent>>,
    /// Image writes addressed to this key fail
    failing_key: Option<u8>,
}

impl RecordingTransport {
    fn new(kind: DeviceKind) -> Self {
        Self {
            info: TransportDeviceInfo {
                vid: VENDOR_ID,
                pid: 0xC354,
                kind,
                device_path: "mock".into(),
                serial: None,
                product_name: Some("Recording keypad".into()),
            },
            writes: Mutex::new(Vec::new()),
            events: Mutex::new(VecDeque::new()),
            failing_key: None,
        }
    }

    fn failing_on(mut self, key: u8) -> Self {
        self.failing_key = Some(key);
        self
    }

    fn push_event(&self, event: KeypadEvent) {
        self.events.lock().push_back(event);
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// LCD packets only, with their decoded control byte
    fn lcd_packets(&self) -> Vec<(ControlByte, Vec<u8>)> {
        self.writes()
            .into_iter()
            .filter(|w| w.len() == lcd::MAX_PACKET_SIZE && w[..4] == lcd::OPCODE)
            .map(|w| (ControlByte::from(w[4]), w))
            .collect()
    }

    /// First packets of every image, with the key their header addresses
    fn image_starts(&self) -> Vec<(u8, Vec<u8>)> {
        self.lcd_packets()
            .into_iter()
            .filter(|(c, _)| c.first)
            .filter_map(|(_, data)| Some((addressed_key(&data)?, data)))
            .collect()
    }
}

/// Key whose tile origin matches a first packet's destination
fn addressed_key(data: &[u8]) -> Option<u8> {
    let position = ImageHeader::parse(data)?.position();
    KeySlot::all()
        .find(|k| k.origin(lcd::TILE_SIZE).ok() == Some(position))
        .map(KeySlot::index)
}

/// JPEG payload carried by a single-packet image
fn first_payload(data: &[u8]) -> Vec<u8> {
    let len = ImageHeader::parse(data).unwrap().payload_len() as usize;
    data[lcd::FIRST_HEADER_SIZE..lcd::FIRST_HEADER_SIZE + len].to_vec()
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        if let Some(key) = self.failing_key {
            let first = data.len() > 4 && ControlByte::from(data[4]).first;
            if first && data[..4] == lcd::OPCODE && addressed_key(data) == Some(key) {
                return Err(TransportError::Disconnected);
            }
        }
        self.writes.lock().push(data.to_vec());
        Ok(())
    }

    async fn read_event(&self, timeout_ms: u32) -> Result<Option<KeypadEvent>, TransportError> {
        let next = self.events.lock().pop_front();
        match next {
            Some(event) => Ok(Some(event)),
            None => {
                tokio::time::sleep(Duration::from_millis(u64::from(timeout_ms))).await;
                Ok(None)
            }
        }
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn open(transport: RecordingTransport) -> (Arc<RecordingTransport>, KeypadInterface) {
    open_with(transport, KeypadSettings::default())
}

fn open_with(
    transport: RecordingTransport,
    settings: KeypadSettings,
) -> (Arc<RecordingTransport>, KeypadInterface) {
    let transport = Arc::new(transport);
    let pad = KeypadInterface::new(Arc::clone(&transport) as Arc<dyn Transport>, settings).unwrap();
    (transport, pad)
}

fn key(index: u8) -> KeySlot {
    KeySlot::new(index).unwrap()
}

/// Tile-sized animation with one solid color per frame
fn animation(colors: &[[u8; 3]], duration_ms: u32) -> Arc<Animation> {
    let size = u32::from(lcd::TILE_SIZE);
    let frames = colors
        .iter()
        .map(|c| {
            let rgba = std::iter::repeat([c[0], c[1], c[2], 255])
                .take((size * size) as usize)
                .flatten()
                .collect();
            AnimationFrame::new(rgba, duration_ms)
        })
        .collect();
    Arc::new(Animation::new(frames, size, size).unwrap())
}

/// Tile-sized frame of pseudo-random pixels, too big for one packet once encoded
fn noise_animation(duration_ms: u32) -> Arc<Animation> {
    let size = u32::from(lcd::TILE_SIZE);
    let mut state: u32 = 0x2545_f491;
    let rgba = (0..size * size)
        .flat_map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            [r, g, b, 255]
        })
        .collect();
    Arc::new(Animation::new(vec![AnimationFrame::new(rgba, duration_ms)], size, size).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_sends_handshake() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    pad.initialize().await.unwrap();

    let writes = transport.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], init::REPORTS[0].to_vec());
    assert_eq!(writes[1], init::REPORTS[1].to_vec());
    assert_eq!(writes[0][init::SELECTOR_OFFSET], 0xa1);
    assert_eq!(writes[1][init::SELECTOR_OFFSET], 0xa2);
}

#[tokio::test(flavor = "multi_thread")]
async fn dialpad_is_rejected() {
    let transport = Arc::new(RecordingTransport::new(DeviceKind::MxDialpad));
    let result = KeypadInterface::new(transport as Arc<dyn Transport>, KeypadSettings::default());
    assert!(matches!(result, Err(KeypadError::NotSupported(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn set_key_color_writes_one_packet() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    pad.set_key_color(key(7), Rgb::new(0, 0, 255)).await.unwrap();

    let packets = transport.lcd_packets();
    assert_eq!(packets.len(), 1);
    let (control, data) = &packets[0];
    assert_eq!(control.index, 1);
    assert!(control.first && control.last);

    let header = ImageHeader::parse(data).unwrap();
    // Key 7 is row 2, column 1
    assert_eq!(header.position(), (23 + 158, 6 + 2 * 158));
    assert_eq!(header.size(), (118, 118));
    let len = header.payload_len() as usize;
    let jpeg = &data[lcd::FIRST_HEADER_SIZE..lcd::FIRST_HEADER_SIZE + len];
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(&jpeg[len - 2..], &[0xFF, 0xD9]);
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_all_blanks_every_key() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    pad.clear_all().await.unwrap();

    let keys: Vec<u8> = transport.image_starts().iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, (0..9).collect::<Vec<u8>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn looping_animation_on_one_key() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    let anim = animation(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]], 20);

    let expected: Vec<Vec<u8>> = anim
        .frames()
        .iter()
        .map(|f| jpeg::encode_rgba(f.rgba(), 118, 118, lcd::DEFAULT_QUALITY).unwrap())
        .collect();

    pad.player().start(key(4), Arc::clone(&anim), true).await.unwrap();
    assert_eq!(pad.player().state(key(4)), PlaybackState::Playing);
    assert_eq!(pad.player().active_keys(), vec![key(4)]);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(pad.player().stop_all().await, 1);

    // Solid frames fit in one packet each
    let packets = transport.lcd_packets();
    assert!(packets.iter().all(|(c, _)| c.first && c.last));

    let starts = transport.image_starts();
    assert_eq!(starts.len(), packets.len());
    // More than one pass over the three frames
    assert!(starts.len() > 3, "only {} frames sent", starts.len());
    for (i, (key, data)) in starts.iter().enumerate() {
        assert_eq!(*key, 4);
        assert_eq!(ImageHeader::parse(data).unwrap().position(), (23 + 158, 6 + 158));
        // Frames go out in order and frame 0 follows frame 2
        assert_eq!(first_payload(data), expected[i % 3], "image {} out of order", i);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_honored_between_packets_of_a_frame() {
    let mut settings = KeypadSettings::default();
    settings.timings.inter_packet_delay_ms = 300;
    let (transport, pad) = open_with(RecordingTransport::new(DeviceKind::MxKeypad), settings);

    let anim = noise_animation(1000);
    let payload = jpeg::encode_rgba(anim.frames()[0].rgba(), 118, 118, settings.quality).unwrap();
    assert!(packet_count(payload.len()) >= 2, "noise frame fits one packet");

    pad.player().start(key(3), anim, true).await.unwrap();
    // Stop inside the pause that follows the first packet
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while transport.lcd_packets().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "first packet never sent");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(pad.player().stop(key(3)).await);

    let packets = transport.lcd_packets();
    assert_eq!(packets.len(), 1, "packets kept flowing after stop");
    let (control, data) = &packets[0];
    assert!(control.first);
    assert!(!control.last);
    assert_eq!(addressed_key(data), Some(3));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(transport.lcd_packets().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_all_halts_every_key() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    let anim = animation(&[[10, 20, 30], [40, 50, 60]], 15);

    for slot in KeySlot::all() {
        pad.player().start(slot, Arc::clone(&anim), true).await.unwrap();
    }
    assert_eq!(pad.player().active_keys().len(), 9);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pad.player().stop_all().await, 9);
    assert!(pad.player().active_keys().is_empty());

    let after_stop = transport.write_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.write_count(), after_stop);
    assert!(after_stop > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_animation_completes() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    let anim = animation(&[[255, 255, 255], [0, 0, 0]], 10);

    pad.player().start(key(0), anim, false).await.unwrap();
    let outcome = pad.player().wait(key(0)).await;
    assert!(matches!(outcome, Some(Ok(()))));

    assert_eq!(pad.player().state(key(0)), PlaybackState::Idle);
    let status = pad.player().status(key(0)).unwrap();
    assert_eq!(status.loops_completed, 1);
    assert_eq!(status.frame_index, 1);
    assert!(status.last_sent.is_some());

    let firsts = transport.lcd_packets().iter().filter(|(c, _)| c.first).count();
    assert_eq!(firsts, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn start_replaces_running_animation() {
    let (_transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));

    pad.player()
        .start(key(2), animation(&[[1, 2, 3]], 50), true)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    // The looping task would never end; a finished wait proves it was replaced
    pad.player()
        .start(key(2), animation(&[[4, 5, 6]], 10), false)
        .await
        .unwrap();
    assert_eq!(pad.player().active_keys().len(), 1);
    assert!(matches!(pad.player().wait(key(2)).await, Some(Ok(()))));
    assert!(pad.player().active_keys().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn write_failure_stops_only_that_key() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad).failing_on(1));
    let anim = animation(&[[9, 9, 9], [90, 90, 90]], 20);

    pad.player().start(key(0), Arc::clone(&anim), true).await.unwrap();
    pad.player().start(key(1), anim, true).await.unwrap();

    let outcome = pad.player().wait(key(1)).await;
    assert!(matches!(outcome, Some(Err(KeypadError::Transport(_)))));
    assert_eq!(pad.player().state(key(1)), PlaybackState::Idle);
    assert_eq!(pad.player().state(key(0)), PlaybackState::Playing);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pad.player().stop_all().await, 1);
    let starts = transport.image_starts();
    assert!(!starts.is_empty());
    assert!(starts.iter().all(|(k, _)| *k == 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn set_key_image_stops_playback_on_that_key() {
    let (_transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    pad.player()
        .start(key(5), animation(&[[1, 1, 1], [2, 2, 2]], 20), true)
        .await
        .unwrap();
    pad.player()
        .start(key(6), animation(&[[3, 3, 3]], 20), true)
        .await
        .unwrap();

    pad.set_key_color(key(5), Rgb::new(255, 0, 0)).await.unwrap();
    assert_eq!(pad.player().state(key(5)), PlaybackState::Idle);
    assert_eq!(pad.player().state(key(6)), PlaybackState::Playing);
    pad.player().stop_all().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn start_rejects_wrong_frame_size() {
    let (_transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    let small = Animation::new(vec![AnimationFrame::new(vec![0; 16 * 16 * 4], 100)], 16, 16).unwrap();
    let result = pad.player().start(key(0), Arc::new(small), true).await;
    assert!(matches!(result, Err(KeypadError::InvalidParameter(_))));
    assert_eq!(pad.player().state(key(0)), PlaybackState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn next_button_press_skips_state_events() {
    let (transport, pad) = open(RecordingTransport::new(DeviceKind::MxKeypad));
    transport.push_event(KeypadEvent::ButtonState { state: 3 });
    transport.push_event(KeypadEvent::ButtonActivated { key: 2 });

    let pressed = pad.next_button_press(Duration::from_millis(500)).await.unwrap();
    assert_eq!(pressed, Some(key(2)));

    let none = pad.next_button_press(Duration::from_millis(30)).await.unwrap();
    assert_eq!(none, None);
}

/// Cycles colors over every key of a real keypad, then clears it.
#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn hardware_color_cycle() {
    let transport = mxconsole_transport::HidDiscovery::new()
        .open_first()
        .await
        .expect("No keypad found - plug in an MX Creative Console");
    let pad = KeypadInterface::new(transport, KeypadSettings::default()).unwrap();
    pad.initialize().await.unwrap();

    let anim = animation(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]], 200);
    for slot in KeySlot::all() {
        pad.player().start(slot, Arc::clone(&anim), true).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(pad.player().stop_all().await, 9);
    pad.clear_all().await.unwrap();
}
