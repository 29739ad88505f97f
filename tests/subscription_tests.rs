mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{game_with, MockApi};
use connect_four_client::transport::{InMemoryAcceptor, InMemoryConnector, InMemoryTransport};
use connect_four_client::{
    ChannelUpdate, ClientConfig, GameId, GameSession, Message, ReconnectPolicy, Subscription,
    Transport,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: 0.0,
    }
}

fn live_session(api: MockApi) -> (GameSession<Arc<MockApi>>, InMemoryAcceptor) {
    let (connector, acceptor) = InMemoryConnector::channel();
    let config = ClientConfig::default()
        .with_reconnect(fast_policy(3))
        .with_shutdown_timeout(Duration::from_millis(500));
    let session = GameSession::new(Arc::new(api), config).with_connector(Arc::new(connector));
    (session, acceptor)
}

async fn accept(acceptor: &mut InMemoryAcceptor) -> InMemoryTransport {
    timeout(WAIT, acceptor.accept())
        .await
        .expect("connection within timeout")
        .expect("connector alive")
}

async fn recv(server: &mut InMemoryTransport) -> Message {
    timeout(WAIT, server.recv())
        .await
        .expect("message within timeout")
        .expect("channel open")
}

async fn next<A: connect_four_client::GameApi>(session: &mut GameSession<A>) -> Option<ChannelUpdate> {
    timeout(WAIT, session.next_update()).await.expect("update within timeout")
}

/// Session open on game 42 with its channel joined.
async fn joined() -> (GameSession<Arc<MockApi>>, InMemoryAcceptor, InMemoryTransport) {
    let api = MockApi::new();
    api.insert(game_with(42, &[]));
    let (mut session, mut acceptor) = live_session(api);
    assert!(session.open(GameId(42)).await);
    assert!(session.is_subscribed());

    let mut server = accept(&mut acceptor).await;
    assert_eq!(recv(&mut server).await, Message::JoinGame { game_id: GameId(42) });
    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Connectivity(true)));
    assert!(session.is_connected());
    (session, acceptor, server)
}

#[tokio::test]
async fn pushed_snapshot_replaces_state() {
    let (mut session, _acceptor, mut server) = joined().await;

    let pushed = game_with(42, &[3, 4]);
    server.send(Message::GameUpdated(pushed.clone())).await.unwrap();

    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Snapshot(pushed.clone())));
    assert_eq!(session.game(), Some(pushed));
}

#[tokio::test]
async fn snapshot_for_other_game_is_ignored() {
    let (mut session, _acceptor, mut server) = joined().await;
    let before = session.game();

    server.send(Message::GameUpdated(game_with(7, &[0]))).await.unwrap();

    assert!(matches!(next(&mut session).await, Some(ChannelUpdate::Snapshot(_))));
    assert_eq!(session.game(), before);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn server_chatter_is_not_forwarded() {
    let (mut session, _acceptor, mut server) = joined().await;

    server.send(Message::Connected { data: Some("Connected to server".into()) }).await.unwrap();
    server
        .send(Message::JoinedGame { game_id: GameId(42), room: Some("game_42".into()) })
        .await
        .unwrap();
    let pushed = game_with(42, &[1]);
    server.send(Message::GameUpdated(pushed.clone())).await.unwrap();

    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Snapshot(pushed)));
}

#[tokio::test]
async fn channel_error_becomes_current_error() {
    let (mut session, _acceptor, mut server) = joined().await;

    server.send(Message::Error { message: "Game not found".into() }).await.unwrap();

    assert_eq!(
        next(&mut session).await,
        Some(ChannelUpdate::ChannelError("Game not found".into()))
    );
    assert_eq!(session.error().as_deref(), Some("Game not found"));
    assert!(session.is_connected());
    assert!(session.game().is_some());
}

#[tokio::test]
async fn disconnect_keeps_snapshot_and_reconnects() {
    let (mut session, mut acceptor, server) = joined().await;
    let before = session.game();

    drop(server);

    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Connectivity(false)));
    assert!(!session.is_connected());
    assert_eq!(session.game(), before);

    let mut server = accept(&mut acceptor).await;
    assert_eq!(recv(&mut server).await, Message::JoinGame { game_id: GameId(42) });
    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Connectivity(true)));
    assert!(session.is_connected());
}

#[tokio::test]
async fn gives_up_after_bounded_attempts() {
    let api = MockApi::new();
    api.insert(game_with(42, &[]));
    let (mut session, acceptor) = live_session(api);
    acceptor.refuse(true);

    assert!(session.open(GameId(42)).await);

    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Connectivity(false)));
    assert_eq!(next(&mut session).await, None);
    assert_eq!(acceptor.attempts(), 3);
    assert!(!session.is_subscribed());
    assert!(session.game().is_some());
}

#[tokio::test]
async fn server_dropping_every_connection_is_bounded() {
    let (connector, mut acceptor) = InMemoryConnector::channel();
    let policy = ReconnectPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(20),
        jitter: 0.0,
    };
    let started = tokio::time::Instant::now();
    let (subscription, mut updates) =
        Subscription::start(GameId(42), Arc::new(connector), policy, Duration::from_millis(100));

    let mut connects = 0;
    let mut drops = 0;
    let drain = async {
        loop {
            tokio::select! {
                // accept, then hang up before sending anything
                Some(server) = acceptor.accept() => drop(server),
                update = updates.recv() => match update {
                    Some(ChannelUpdate::Connectivity(true)) => connects += 1,
                    Some(ChannelUpdate::Connectivity(false)) => drops += 1,
                    Some(other) => panic!("unexpected update {:?}", other),
                    None => break,
                },
            }
        }
    };
    timeout(WAIT, drain).await.expect("subscription gives up");

    assert_eq!(connects, 3);
    assert_eq!(drops, 3);
    assert_eq!(acceptor.attempts(), 3);
    // two backoff sleeps between the three attempts
    assert!(started.elapsed() >= Duration::from_millis(40));
    timeout(WAIT, async {
        while !subscription.is_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("task exits after giving up");
}

#[tokio::test]
async fn refused_attempts_then_success() {
    let api = MockApi::new();
    api.insert(game_with(42, &[]));
    let (connector, mut acceptor) = InMemoryConnector::channel();
    let config = ClientConfig::default().with_reconnect(ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(20),
        ..fast_policy(10)
    });
    let mut session = GameSession::new(Arc::new(api), config).with_connector(Arc::new(connector));
    acceptor.refuse(true);
    assert!(session.open(GameId(42)).await);

    tokio::time::sleep(Duration::from_millis(10)).await;
    acceptor.refuse(false);

    let mut server = accept(&mut acceptor).await;
    assert_eq!(recv(&mut server).await, Message::JoinGame { game_id: GameId(42) });
    assert_eq!(next(&mut session).await, Some(ChannelUpdate::Connectivity(true)));
    assert!(acceptor.attempts() >= 2);
}

#[tokio::test]
async fn close_leaves_channel() {
    let (mut session, _acceptor, mut server) = joined().await;

    session.close().await;

    assert_eq!(recv(&mut server).await, Message::LeaveGame { game_id: GameId(42) });
    assert!(server.recv().await.is_err());
    assert!(!session.is_subscribed());
    assert!(!session.is_connected());
    assert!(session.game().is_none());
}

#[tokio::test]
async fn switching_games_tears_down_old_channel() {
    let api = MockApi::new();
    api.insert(game_with(42, &[]));
    api.insert(game_with(43, &[5]));
    let (mut session, mut acceptor) = live_session(api);

    assert!(session.open(GameId(42)).await);
    let mut first = accept(&mut acceptor).await;
    assert_eq!(recv(&mut first).await, Message::JoinGame { game_id: GameId(42) });

    assert!(session.open(GameId(43)).await);
    assert_eq!(recv(&mut first).await, Message::LeaveGame { game_id: GameId(42) });
    assert!(first.recv().await.is_err());

    let mut second = accept(&mut acceptor).await;
    assert_eq!(recv(&mut second).await, Message::JoinGame { game_id: GameId(43) });
    assert_eq!(session.game_id(), Some(GameId(43)));

    // a late push for the abandoned game cannot reach the new session
    assert!(first.send(Message::GameUpdated(game_with(42, &[0]))).await.is_err());
    second.send(Message::GameUpdated(game_with(42, &[0]))).await.unwrap();
    let before = session.game();
    loop {
        match next(&mut session).await {
            Some(ChannelUpdate::Snapshot(_)) => break,
            Some(_) => continue,
            None => panic!("subscription ended"),
        }
    }
    assert_eq!(session.game(), before);
}

#[tokio::test]
async fn subscribe_without_connector_is_refused() {
    let api = MockApi::new();
    api.insert(game_with(1, &[]));
    let mut session = GameSession::new(Arc::new(api), ClientConfig::default());

    assert!(!session.subscribe().await);
    assert!(session.open(GameId(1)).await);
    assert!(!session.is_subscribed());
    assert_eq!(session.next_update().await, None);
}

#[tokio::test]
async fn dropped_subscription_closes_connection() {
    let (connector, mut acceptor) = InMemoryConnector::channel();
    let (subscription, _updates) = Subscription::start(
        GameId(9),
        Arc::new(connector),
        fast_policy(3),
        Duration::from_millis(100),
    );
    let mut server = accept(&mut acceptor).await;
    assert_eq!(recv(&mut server).await, Message::JoinGame { game_id: GameId(9) });
    assert_eq!(subscription.game_id(), GameId(9));

    drop(subscription);

    assert!(timeout(WAIT, server.recv()).await.unwrap().is_err());
}
