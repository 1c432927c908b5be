use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::NaiveDate;
use futures::StreamExt;
use rating_candles::{
    aggregator::aggregate,
    models::{observation::Observation, perf_type::PerfType, request_params::GamesRequestParams},
    providers::{
        GameProvider, ProviderError,
        lichess::{LichessProvider, LichessSettings},
        retry::RetryPolicy,
    },
};
use secrecy::SecretString;
use serial_test::serial;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// Minimal HTTP/1.1 server answering one scripted response per connection.
struct Stub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Stub {
    async fn serve(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                seen.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/x-ndjson\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        Self { addr, requests }
    }

    fn provider(&self, token: Option<&str>) -> LichessProvider {
        let settings = LichessSettings {
            base_url: format!("http://{}", self.addr),
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                ..RetryPolicy::default()
            },
            ..LichessSettings::default()
        };
        LichessProvider::new(settings, token.map(|t| SecretString::new(t.into()))).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn game_line(id: &str, created_at: i64, rating: i32, diff: i32) -> String {
    format!(
        r#"{{"id":"{id}","rated":true,"speed":"bullet","perf":"bullet","createdAt":{created_at},"lastMoveAt":{},"status":"resign","players":{{"white":{{"user":{{"name":"German11","id":"german11"}},"rating":{rating},"ratingDiff":{diff}}},"black":{{"user":{{"name":"Rival","id":"rival"}},"rating":1600,"ratingDiff":{}}}}}}}"#,
        created_at + 60_000,
        -diff
    )
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn history() -> String {
    [
        game_line("g3", 1_704_283_200_000, 1500, 12), // 2024-01-03 12:00Z
        game_line("g2", 1_704_276_000_000, 1480, 20), // 2024-01-03 10:00Z
        String::new(),
        game_line("g1", 1_704_225_600_000, 1450, 30), // 2024-01-02 20:00Z
    ]
    .join("\n")
}

#[tokio::test]
async fn streams_resolved_observations_newest_first() {
    let stub = Stub::serve(vec![(200, history())]).await;
    let provider = stub.provider(None);

    let mut params = GamesRequestParams::new("German11", PerfType::Bullet);
    params.max = Some(3);
    let observations: Vec<Observation> = provider
        .fetch_games(params)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(
        observations,
        vec![
            Observation::new(d(3), 1500, 1512),
            Observation::new(d(3), 1480, 1500),
            Observation::new(d(2), 1450, 1480),
        ]
    );

    let bars = aggregate(observations);
    assert_eq!(bars.len(), 2);
    assert_eq!((bars[0].open(), bars[0].close(), bars[0].volume()), (1480, 1512, 2));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request_line = requests[0].lines().next().unwrap();
    assert!(request_line.starts_with("GET /api/games/user/german11?"));
    assert!(request_line.contains("perfType=bullet"));
    assert!(request_line.contains("sort=dateDesc"));
    assert!(request_line.contains("max=3"));
    assert!(requests[0].to_ascii_lowercase().contains("accept: application/x-ndjson"));
}

#[tokio::test]
async fn sends_bearer_token_when_configured() {
    let stub = Stub::serve(vec![(200, String::new()), (200, String::new())]).await;

    let games: Vec<_> = stub
        .provider(Some("lip_secret"))
        .fetch_games(GamesRequestParams::new("german11", PerfType::Blitz))
        .await
        .unwrap()
        .collect()
        .await;
    assert!(games.is_empty());

    stub.provider(None)
        .fetch_games(GamesRequestParams::new("german11", PerfType::Blitz))
        .await
        .unwrap();

    let requests = stub.requests();
    assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer lip_secret"));
    assert!(!requests[1].to_ascii_lowercase().contains("authorization"));
}

#[tokio::test]
async fn retries_transient_statuses() {
    let stub = Stub::serve(vec![
        (503, "busy".into()),
        (429, "slow down".into()),
        (200, game_line("g1", 1_704_225_600_000, 1450, 30)),
    ])
    .await;

    let games: Vec<_> = stub
        .provider(None)
        .fetch_games(GamesRequestParams::new("german11", PerfType::Bullet))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(games.len(), 1);
    assert_eq!(stub.requests().len(), 3);
}

#[tokio::test]
async fn gives_up_when_retries_run_out() {
    let stub = Stub::serve(vec![
        (502, String::new()),
        (502, String::new()),
        (502, String::new()),
    ])
    .await;

    let err = stub
        .provider(None)
        .fetch_games(GamesRequestParams::new("german11", PerfType::Bullet))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProviderError::RetriesExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let stub = Stub::serve(vec![(404, "{\"error\":\"Not found\"}".into())]).await;

    let err = stub
        .provider(None)
        .fetch_games(GamesRequestParams::new("no-such-player", PerfType::Bullet))
        .await
        .err()
        .unwrap();

    match err {
        ProviderError::Api { status, message, .. } => {
            assert_eq!(status, 404);
            assert!(message.contains("Not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn unresolvable_game_breaks_the_stream() {
    let orphan = r#"{"id":"zz","createdAt":1704225600000,"players":{"white":{"user":{"id":"a"},"rating":1},"black":{"user":{"id":"b"},"rating":2}}}"#;
    let body = [game_line("g3", 1_704_283_200_000, 1500, 12), orphan.to_string()].join("\n");
    let stub = Stub::serve(vec![(200, body)]).await;

    let items: Vec<_> = stub
        .provider(None)
        .fetch_games(GamesRequestParams::new("german11", PerfType::Bullet))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    let err = items[1].as_ref().unwrap_err();
    assert!(err.is_malformed_observation());
    assert!(err.to_string().contains("zz"));
}

#[tokio::test]
async fn empty_user_is_rejected_before_any_request() {
    let stub = Stub::serve(vec![]).await;
    let err = stub
        .provider(None)
        .fetch_games(GamesRequestParams::new("  ", PerfType::Bullet))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProviderError::Validation { .. }));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
#[serial]
#[ignore]
async fn live_lichess_fetch() {
    // Hits lichess.org; LICHESS_TOKEN is optional and only raises rate limits.
    let token = shared_utils::env::get_optional_env_var("LICHESS_TOKEN").map(|t| SecretString::new(t.into()));
    let provider = LichessProvider::new(LichessSettings::default(), token).expect("provider");

    let mut params = GamesRequestParams::new("german11", PerfType::Bullet);
    params.max = Some(20);
    let observations: Vec<_> = provider
        .fetch_games(params)
        .await
        .expect("fetch_games")
        .collect()
        .await;

    assert!(!observations.is_empty());
    assert!(observations.len() <= 20);
    let dates: Vec<_> = observations.into_iter().map(|o| o.unwrap().date).collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]), "games must arrive newest first");
}
