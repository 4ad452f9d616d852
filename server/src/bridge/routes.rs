use crate::bridge::broadcaster::Broadcaster;
use crate::bridge::session;
use log::{error, info};
use serde_json::json;
use std::convert::Infallible;
use warp::{http::StatusCode, Filter};

/// Websocket stream at `/` and `/ws`, one-shot query at
/// `GET /api/detections`.
pub fn routes(
    broadcaster: Broadcaster,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let broadcaster_filter = warp::any().map(move || broadcaster.clone());

    let stream_route = warp::path::end()
        .or(warp::path("ws").and(warp::path::end()))
        .unify()
        .and(warp::ws())
        .and(broadcaster_filter.clone())
        .map(|ws: warp::ws::Ws, broadcaster: Broadcaster| {
            ws.on_upgrade(move |socket| session::serve_viewer(socket, broadcaster))
        });

    let cors = warp::cors().allow_any_origin().allow_methods(vec!["GET"]);
    let query_route = warp::path!("api" / "detections")
        .and(warp::get())
        .and(broadcaster_filter)
        .and_then(list_detections)
        .with(cors);

    stream_route.or(query_route)
}

async fn list_detections(broadcaster: Broadcaster) -> Result<impl warp::Reply, Infallible> {
    info!("query endpoint hit: /api/detections");
    match broadcaster.fetch_snapshot().await {
        Ok(snapshot) => Ok(warp::reply::with_status(
            warp::reply::json(&snapshot),
            StatusCode::OK,
        )),
        Err(err) => {
            error!("query endpoint failed: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": err.to_string() })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::registry::Registry;
    use chrono::{TimeZone, Utc};
    use feedcore::store::MemoryStore;
    use feedcore::telemetry::BroadcastMetrics;
    use feedcore::{Detection, Snapshot};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, Broadcaster) {
        let store = Arc::new(MemoryStore::with_records(vec![
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap(),
                "Gate1",
                0,
                "05/03/2024",
                "10:15:00",
            ),
            Detection::new(
                Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
                "Gate2",
                1,
                "05/03/2024",
                "09:00:00",
            ),
        ]));
        let broadcaster = Broadcaster::new(
            store.clone(),
            Registry::new(),
            Arc::new(BroadcastMetrics::new()),
        );
        (store, broadcaster)
    }

    #[tokio::test]
    async fn query_endpoint_returns_ordered_array() {
        let (_store, broadcaster) = setup();
        let response = warp::test::request()
            .method("GET")
            .path("/api/detections")
            .reply(&routes(broadcaster))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Vec<serde_json::Value> = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["location"], "Gate1");
        assert_eq!(body[0]["timestamp"], "2024-03-05T10:15:00Z");
    }

    #[tokio::test]
    async fn query_endpoint_reports_store_failure() {
        let (store, broadcaster) = setup();
        store.set_unavailable(true);
        let response = warp::test::request()
            .method("GET")
            .path("/api/detections")
            .reply(&routes(broadcaster))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn viewer_gets_snapshot_on_connect_and_on_tick() {
        let (_store, broadcaster) = setup();
        let mut client = warp::test::ws()
            .path("/ws")
            .handshake(routes(broadcaster.clone()))
            .await
            .expect("handshake");

        let greeting = client.recv().await.expect("initial snapshot");
        let snapshot = Snapshot::from_json(greeting.to_str().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(broadcaster.registry().len(), 1);

        let report = broadcaster.tick().await.unwrap();
        assert_eq!(report.delivered, 1);
        let pushed = client.recv().await.expect("tick snapshot");
        assert_eq!(pushed.to_str().unwrap(), snapshot.to_json().unwrap());
    }

    #[tokio::test]
    async fn closing_viewer_leaves_registry() {
        let (_store, broadcaster) = setup();
        let mut client = warp::test::ws()
            .path("/")
            .handshake(routes(broadcaster.clone()))
            .await
            .expect("handshake");
        client.recv().await.expect("initial snapshot");

        client.send(warp::ws::Message::close()).await;
        for _ in 0..100 {
            if broadcaster.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(broadcaster.registry().is_empty());
        // A tick after the disconnect is not an error.
        assert_eq!(broadcaster.tick().await.unwrap().delivered, 0);
    }
}
