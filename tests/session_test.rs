use std::{sync::Arc, time::Duration};

use launcher_host::{host::PluginHost, manifest::PluginManifest, router::Router, session::Session};
use async_trait::async_trait;
use launcher_plugin::{
    Envelope, EventHandlers, IntentKind, LauncherPlugin, MessageKind, PluginFactory, PluginUtils,
    outbox,
    plugin_test_util::{Behaviour, Call, RecordingPlugin},
};
use serde_json::{Value, json};

fn qrcode() -> PluginManifest {
    PluginManifest {
        name: Some("qrcode".into()),
        title: Some("QR".into()),
        icon: Some("qr.png".into()),
        mode: Some("list".into()),
        keywords: vec!["qr".into()],
        ..Default::default()
    }
}

#[tokio::test]
async fn requests_are_handled_in_arrival_order() {
    let (tx, mut rx) = outbox();
    let host = PluginHost::new(tx);
    let plugin = Arc::new(
        RecordingPlugin::new().with_behaviour(Behaviour::Stall(Duration::from_millis(20))),
    );
    host.add_plugin_with(qrcode(), RecordingPlugin::factory(plugin.clone())).unwrap();
    rx.recv().await.unwrap(); // updateCommands

    let session = Session::spawn(Arc::new(Router::new(host, Some(Duration::from_secs(5)))));
    let handle = session.handle();

    let requests: Vec<Envelope> = ["a", "b", "c"]
        .iter()
        .map(|kw| {
            Envelope::request(
                MessageKind::Intent(IntentKind::OnSearch),
                json!({ "keyword": kw, "command": { "id": "qrcode" } }),
            )
        })
        .collect();
    for req in &requests {
        assert!(handle.submit(req.clone()));
    }

    for req in &requests {
        let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(reply.is_reply_to(req));
    }
    assert_eq!(
        plugin.calls(),
        vec![Call::Search("a".into()), Call::Search("b".into()), Call::Search("c".into())]
    );

    drop(handle);
    session.close().await;
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_session() {
    let (tx, mut rx) = outbox();
    let host = PluginHost::new(tx);
    let session = Session::spawn(Arc::new(Router::new(host, None)));
    let handle = session.handle();

    assert!(!handle.submit_text("{ this is not json"));
    assert!(!handle.submit_text(r#"{"type":"getCommands"}"#));

    let req = Envelope::request(MessageKind::Intent(IntentKind::GetCommands), json!({}));
    assert!(handle.submit_text(&req.to_json().unwrap()));

    let reply = rx.recv().await.unwrap();
    assert!(reply.is_reply_to(&req));
    assert_eq!(reply.payload["commands"], json!([]));

    drop(handle);
    session.close().await;
}

/// Validates its input before building the handler future.
struct Strict;

#[async_trait]
impl LauncherPlugin for Strict {
    fn methods(&self) -> EventHandlers {
        EventHandlers::new().with("boom", |data: Value| {
            data["n"].as_u64().expect("n required");
            async move { Ok(()) }
        })
    }
}

fn strict() -> PluginFactory {
    Arc::new(|_utils: PluginUtils| Arc::new(Strict) as Arc<dyn LauncherPlugin>)
}

#[tokio::test]
async fn handler_panicking_before_its_future_keeps_the_session_alive() {
    let (tx, mut rx) = outbox();
    let host = PluginHost::new(tx);
    host.add_plugin_with(qrcode(), strict()).unwrap();
    rx.recv().await.unwrap(); // updateCommands
    host.focus().set("qrcode");

    let session = Session::spawn(Arc::new(Router::new(host, Some(Duration::from_secs(5)))));
    let handle = session.handle();

    let event = Envelope::request(MessageKind::Event, json!({ "handlerName": "boom", "eventData": {} }));
    assert!(handle.submit(event.clone()));
    let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(reply.is_reply_to(&event));
    assert!(reply.payload.is_empty());

    let follow_up = Envelope::request(MessageKind::Intent(IntentKind::GetCommands), json!({}));
    assert!(handle.submit(follow_up.clone()));
    let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(reply.is_reply_to(&follow_up));
    assert_eq!(reply.payload["commands"][0]["id"], "qrcode");

    drop(handle);
    session.close().await;
}
