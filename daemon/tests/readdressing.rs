//! Moving a live panel to another universe must leave nothing listening on
//! the old one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledpanel::RGB8;
use ledpanel::plan::{PanelAddress, PanelGeometry};
use ledpanel_daemon::artnet::{self, ArtNetClient, Subscriptions};
use ledpanel_daemon::client::UniverseFrame;
use ledpanel_daemon::event_loop::{EventLoop, LoopHandle};
use ledpanel_daemon::led::SmartLedStrip;
use ledpanel_daemon::panel::PanelController;
use smart_leds::SmartLedsWrite;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Records every frame pushed to the strip.
#[derive(Clone, Default)]
struct SpyWriter(Arc<Mutex<Vec<Vec<RGB8>>>>);

impl SpyWriter {
    fn frames(&self) -> Vec<Vec<RGB8>> {
        self.0.lock().unwrap().clone()
    }
}

impl SmartLedsWrite for SpyWriter {
    type Error = ();
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let frame = iterator.into_iter().map(|color| color.into()).collect();
        self.0.lock().unwrap().push(frame);
        Ok(())
    }
}

struct Rig {
    writer: SpyWriter,
    subscriptions: Subscriptions,
    handle: LoopHandle,
    frames: mpsc::Sender<UniverseFrame>,
    shutdown_token: CancellationToken,
    task: JoinHandle<PanelController>,
}

/// A 17x17 panel at universe 0, subscribed, with the event loop running.
fn rig() -> Rig {
    let writer = SpyWriter::default();
    let client = ArtNetClient::new();
    let subscriptions = client.subscriptions();
    let geometry = PanelGeometry::square(17);
    let mut panel = PanelController::new(
        geometry,
        PanelAddress::new(0, 0).unwrap(),
        Box::new(client),
        Box::new(SmartLedStrip::new(writer.clone(), geometry.pixel_count(), 255)),
        255,
    )
    .unwrap();
    panel.subscribe().unwrap();

    let (frames, frames_rx) = mpsc::channel(16);
    let (event_loop, handle) = EventLoop::new(panel, frames_rx);
    let shutdown_token = CancellationToken::new();
    let task = tokio::spawn(event_loop.run(shutdown_token.clone()));
    Rig {
        writer,
        subscriptions,
        handle,
        frames,
        shutdown_token,
        task,
    }
}

fn frame(universe: u16, value: u8) -> UniverseFrame {
    UniverseFrame {
        universe,
        data: vec![value; 512],
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_old_universes_are_never_handled_after_readdress() {
    let rig = rig();
    rig.frames.send(frame(0, 1)).await.unwrap();
    wait_for(|| rig.writer.frames().len() == 1).await;

    rig.handle
        .execute(|panel| panel.set_address(Some(5), None).unwrap())
        .unwrap();
    for universe in [0, 1] {
        rig.frames.send(frame(universe, 2)).await.unwrap();
    }
    rig.frames.send(frame(5, 3)).await.unwrap();
    wait_for(|| rig.writer.frames().len() == 2).await;

    assert!(!rig.subscriptions.contains(0));
    assert!(!rig.subscriptions.contains(1));
    assert!(rig.subscriptions.contains(5));
    assert!(rig.subscriptions.contains(6));

    let frames = rig.writer.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1][0], RGB8::new(3, 3, 3));
    // nothing has been sent on universe 6 yet
    assert_eq!(frames[1][288], RGB8::default());

    rig.shutdown_token.cancel();
    let panel = rig.task.await.unwrap();
    assert_eq!(panel.address(), PanelAddress::new(5, 0).unwrap());
}

#[tokio::test]
async fn test_frames_queued_before_readdress_are_dropped() {
    let rig = rig();
    // both are queued before the loop gets a chance to run
    rig.frames.send(frame(0, 9)).await.unwrap();
    rig.handle
        .execute(|panel| panel.set_address(Some(5), None).unwrap())
        .unwrap();
    rig.handle
        .execute(|panel| assert_eq!(panel.plan().start_universe(), 5))
        .unwrap();

    rig.frames.send(frame(5, 4)).await.unwrap();
    wait_for(|| !rig.writer.frames().is_empty()).await;
    assert_eq!(rig.writer.frames().len(), 1);
    assert_eq!(rig.writer.frames()[0][0], RGB8::new(4, 4, 4));

    rig.shutdown_token.cancel();
    rig.task.await.unwrap();
}

#[tokio::test]
async fn test_rejected_address_keeps_listening() {
    let rig = rig();
    rig.handle
        .execute(|panel| assert!(panel.set_address(None, Some(600)).is_err()))
        .unwrap();
    rig.frames.send(frame(1, 7)).await.unwrap();
    wait_for(|| rig.writer.frames().len() == 1).await;
    assert!(rig.subscriptions.contains(0));
    assert!(rig.subscriptions.contains(1));

    rig.shutdown_token.cancel();
    rig.task.await.unwrap();
}

fn art_dmx(universe: u16, data: &[u8]) -> Vec<u8> {
    let mut packet = b"Art-Net\0".to_vec();
    packet.extend_from_slice(&0x5000u16.to_le_bytes());
    packet.extend_from_slice(&14u16.to_be_bytes());
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&universe.to_le_bytes());
    packet.extend_from_slice(&(data.len() as u16).to_be_bytes());
    packet.extend_from_slice(data);
    packet
}

#[tokio::test]
async fn test_art_net_packets_follow_the_panel() {
    let writer = SpyWriter::default();
    let client = ArtNetClient::new();
    let subscriptions = client.subscriptions();
    let geometry = PanelGeometry::square(4);
    let mut panel = PanelController::new(
        geometry,
        PanelAddress::new(0, 0).unwrap(),
        Box::new(client),
        Box::new(SmartLedStrip::new(writer.clone(), geometry.pixel_count(), 255)),
        255,
    )
    .unwrap();
    panel.subscribe().unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = socket.local_addr().unwrap();
    let task_tracker = TaskTracker::new();
    let shutdown_token = CancellationToken::new();
    let (frames_tx, frames_rx) = mpsc::channel(16);
    artnet::run_receiver(
        &task_tracker,
        socket,
        subscriptions,
        frames_tx,
        shutdown_token.clone(),
    );
    let (event_loop, handle) = EventLoop::new(panel, frames_rx);
    let loop_task = tokio::spawn(event_loop.run(shutdown_token.clone()));

    let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    console.send_to(&art_dmx(0, &[10; 48]), target).await.unwrap();
    wait_for(|| writer.frames().len() == 1).await;

    handle
        .execute(|panel| panel.set_address(Some(3), None).unwrap())
        .unwrap();
    // give the loop a moment to readdress before the console moves on
    tokio::time::sleep(Duration::from_millis(50)).await;
    console.send_to(&art_dmx(0, &[20; 48]), target).await.unwrap();
    console.send_to(&art_dmx(3, &[30; 48]), target).await.unwrap();
    wait_for(|| writer.frames().len() == 2).await;
    assert!(writer.frames()[1].iter().all(|pixel| *pixel == RGB8::new(30, 30, 30)));

    shutdown_token.cancel();
    loop_task.await.unwrap();
    task_tracker.close();
    task_tracker.wait().await;
}
