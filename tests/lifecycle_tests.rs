//! Integration tests for install/activate and the auxiliary event handlers.

mod common;

use std::sync::Arc;

use bytes::Bytes;

use offline_gateway::cache::entry::{RequestKey, ResponseSnapshot, ResponseType};
use offline_gateway::gateway::lifecycle::LifecycleState;
use offline_gateway::gateway::notify::NotificationClick;
use offline_gateway::gateway::request::GatewayRequest;
use offline_gateway::gateway::sync::SyncQueue;
use offline_gateway::gateway::{EventOutcome, GatewayError, OfflineGateway, ServedFrom, WorkerEvent};

use common::{active_fixture, fixture_with, origin_for, test_config, Fixture, HostEvent};

#[tokio::test]
async fn test_install_populates_static_generation() {
    let config = test_config();
    let origin = origin_for(&config);
    let fx = fixture_with(config, origin);

    fx.gateway.dispatch(WorkerEvent::Install).await.unwrap();
    assert_eq!(fx.gateway.state().await, LifecycleState::Activating);
    assert_eq!(fx.host.events(), vec![HostEvent::SkipWaiting]);

    fx.gateway.dispatch(WorkerEvent::Activate).await.unwrap();
    assert_eq!(fx.gateway.state().await, LifecycleState::Active);

    // Both manifest paths are served with no network access.
    fx.origin.set_offline(true);
    for path in ["/", "/offline.html"] {
        let served = fx
            .gateway
            .handle(GatewayRequest::navigate(fx.url(path)))
            .await
            .unwrap();
        assert_eq!(served.source, ServedFrom::Cache, "{path}");
    }
    let store = fx.gateway.store().read().await;
    assert_eq!(store.get("app-static-v1").unwrap().len(), 2);
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    let config = test_config();
    let origin = origin_for(&config);
    origin.route(
        "/offline.html",
        ResponseSnapshot::new(500, ResponseType::Basic, "boom"),
    );
    let fx = fixture_with(config, origin);

    let err = fx.gateway.dispatch(WorkerEvent::Install).await.unwrap_err();
    match err {
        GatewayError::Install { path, .. } => assert_eq!(path, "/offline.html"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.gateway.state().await, LifecycleState::Installing);
    assert!(fx.host.events().is_empty());

    // "/" fetched fine but must not have been committed.
    let store = fx.gateway.store().read().await;
    assert!(store
        .match_any(&RequestKey::get(fx.url("/").as_str()))
        .is_none());
}

#[tokio::test]
async fn test_failed_install_blocks_activation() {
    let config = test_config();
    let origin = origin_for(&config);
    origin.set_offline(true);
    let fx = fixture_with(config, origin);

    assert!(fx.gateway.install().await.is_err());
    let err = fx.gateway.activate().await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidState { .. }));
}

#[tokio::test]
async fn test_activate_deletes_stale_generations() {
    let config = test_config();
    let origin = origin_for(&config);
    let fx = fixture_with(config, origin);
    {
        let mut store = fx.gateway.store().write().await;
        store
            .put(
                "app-static-v0",
                RequestKey::get(fx.url("/old.css").as_str()),
                ResponseSnapshot::ok("old"),
            )
            .unwrap();
        store
            .put(
                "app-dynamic-v0",
                RequestKey::get(fx.url("/old/").as_str()),
                ResponseSnapshot::ok("old"),
            )
            .unwrap();
    }

    fx.gateway.install().await.unwrap();
    fx.gateway.activate().await.unwrap();

    let store = fx.gateway.store().read().await;
    let mut names = store.keys();
    names.sort();
    assert_eq!(names, vec!["app-dynamic-v1", "app-static-v1"]);
    assert!(store.get("app-dynamic-v1").unwrap().is_empty());
    assert!(store
        .match_any(&RequestKey::get(fx.url("/old.css").as_str()))
        .is_none());
    assert_eq!(
        fx.host.events(),
        vec![HostEvent::SkipWaiting, HostEvent::ClaimClients]
    );
}

#[tokio::test]
async fn test_version_bump_discards_previous_deployment() {
    let config = test_config();
    let origin = origin_for(&config);
    let v1 = fixture_with(config.clone(), origin.clone());
    v1.gateway.install().await.unwrap();
    v1.gateway.activate().await.unwrap();

    let mut v2_config = config;
    v2_config.cache.version = "2".to_string();
    let v2 = Fixture {
        gateway: Arc::new(
            OfflineGateway::new(
                Arc::new(v2_config),
                v1.gateway.store().clone(),
                origin.clone(),
                v1.host.clone(),
                SyncQueue::in_memory(),
            )
            .unwrap(),
        ),
        origin,
        host: v1.host.clone(),
    };

    v2.gateway.install().await.unwrap();
    // The old deployment keeps its caches until the new one activates.
    assert!(v2.gateway.store().read().await.has("app-static-v1"));

    v2.gateway.activate().await.unwrap();
    let mut names = v2.gateway.store().read().await.keys();
    names.sort();
    assert_eq!(names, vec!["app-dynamic-v2", "app-static-v2"]);
}

#[tokio::test]
async fn test_push_shows_notification() {
    let fx = active_fixture().await;
    let payload = Bytes::from_static(
        r#"{"title": "Ny artikel", "body": "Sådan vinder du SEO", "primaryKey": 7}"#.as_bytes(),
    );

    fx.gateway
        .dispatch(WorkerEvent::Push(Some(payload)))
        .await
        .unwrap();

    let shown: Vec<_> = fx
        .host
        .events()
        .into_iter()
        .filter_map(|e| match e {
            HostEvent::Shown(n) => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Ny artikel");
    assert_eq!(shown[0].options.body, "Sådan vinder du SEO");
    assert_eq!(shown[0].options.data.primary_key, serde_json::json!(7));
    assert_eq!(shown[0].options.actions.len(), 2);
}

#[tokio::test]
async fn test_notification_click_explore_opens_root() {
    let fx = active_fixture().await;

    fx.gateway
        .dispatch(WorkerEvent::NotificationClick(NotificationClick {
            notification_id: "n1".to_string(),
            action: Some("explore".to_string()),
        }))
        .await
        .unwrap();
    fx.gateway
        .dispatch(WorkerEvent::NotificationClick(NotificationClick {
            notification_id: "n2".to_string(),
            action: Some("close".to_string()),
        }))
        .await
        .unwrap();

    let events = fx.host.events();
    assert_eq!(
        &events[2..],
        &[
            HostEvent::Closed("n1".to_string()),
            HostEvent::Opened("/".to_string()),
            HostEvent::Closed("n2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unknown_sync_tag_is_ignored() {
    let fx = active_fixture().await;
    let outcome = fx
        .gateway
        .dispatch(WorkerEvent::Sync {
            tag: "something-else".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, EventOutcome::Settled));
}
