//! Integration tests for the state-synchronization core
//!
//! These wire a real hub task to the tick driver and drive ticks manually,
//! standing in for WebSocket connections with plain channel endpoints.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use arena_server::app::AppState;
use arena_server::config::{Config, SendPolicy};
use arena_server::game::player::PLAYER_SPEED;
use arena_server::game::{GameMap, GameMaster, GameObjects, ObjectManager, COMMAND_QUEUE_CAPACITY};
use arena_server::util::time::tick_delta;
use arena_server::ws::hub::{Hub, HubHandle};
use arena_server::ws::protocol::{ClientMsg, ServerMsg};

const MAP_SEED: u64 = 7;

fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "info".to_string(),
        read_buffer_size: 1024,
        write_buffer_size: 1024,
        send_policy: SendPolicy::Block,
        map_seed: MAP_SEED,
    }
}

/// Everything a test needs to act as the server core
struct Core {
    handle: HubHandle,
    master: GameMaster<GameObjects>,
}

fn start_core() -> Core {
    let (state, hub, master) = AppState::new(test_config());
    tokio::spawn(hub.run());
    Core {
        handle: state.hub,
        master,
    }
}

/// A fake connection: just the hub-facing ends of a real one
struct FakeClient {
    id: i32,
    outbound_rx: mpsc::Receiver<Bytes>,
}

async fn connect_client(handle: &HubHandle) -> FakeClient {
    let (outbound_tx, outbound_rx) = mpsc::channel(256);
    let (shutdown_tx, _shutdown_rx) = oneshot::channel();
    let id = handle.register(outbound_tx, shutdown_tx).await.unwrap();
    FakeClient { id, outbound_rx }
}

impl FakeClient {
    async fn recv_msg(&mut self) -> ServerMsg {
        let bytes = self.outbound_rx.recv().await.expect("connection closed");
        serde_json::from_slice(&bytes).expect("invalid server message")
    }
}

async fn send_frame(handle: &HubHandle, client_id: i32, msg: &ClientMsg) {
    let payload = Bytes::from(serde_json::to_vec(msg).unwrap());
    handle
        .connection_api(client_id)
        .forward(payload)
        .await
        .unwrap();
}

/// Wait until the hub has processed everything submitted so far. Events are
/// handled in submission order, so once this marker comes back every earlier
/// event has been fully applied.
async fn sync_hub(handle: &HubHandle, client: &mut FakeClient) {
    let marker = Bytes::from_static(b"__sync__");
    handle.unicast(client.id, marker.clone()).await.unwrap();
    let got = client.outbound_rx.recv().await.unwrap();
    assert_eq!(got, marker);
}

/// CONNECTION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Connecting clients receive distinct sequential identities
    #[tokio::test]
    async fn clients_receive_sequential_identities() {
        let core = start_core();
        let a = connect_client(&core.handle).await;
        let b = connect_client(&core.handle).await;

        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert_eq!(core.handle.connection_count(), 2);
    }

    /// A disconnect removes the player and tells the remaining clients
    #[tokio::test]
    async fn disconnect_removes_player_and_announces_it() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;
        let mut b = connect_client(&core.handle).await;

        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        send_frame(
            &core.handle,
            b.id,
            &ClientMsg::Join {
                name: "bob".to_string(),
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        let alice_player_id = match a.recv_msg().await {
            ServerMsg::Init { player_id, .. } => player_id,
            other => panic!("expected init, got {:?}", other),
        };
        // Drain the first snapshot from both clients.
        assert!(matches!(a.recv_msg().await, ServerMsg::Snapshot { .. }));
        assert!(matches!(b.recv_msg().await, ServerMsg::Init { .. }));
        assert!(matches!(b.recv_msg().await, ServerMsg::Snapshot { .. }));

        // Alice's connection goes away.
        core.handle.connection_api(a.id).unregister().await;
        sync_hub(&core.handle, &mut b).await;
        core.master.step().await;

        match b.recv_msg().await {
            ServerMsg::PlayerLeft { player_id } => assert_eq!(player_id, alice_player_id),
            other => panic!("expected player-left, got {:?}", other),
        }
        match b.recv_msg().await {
            ServerMsg::Snapshot { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].name, "bob");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }
}

/// TICK DRIVER TESTS
mod tick_tests {
    use super::*;

    /// An idle simulation still broadcasts an (empty) snapshot every tick
    #[tokio::test]
    async fn empty_simulation_broadcasts_empty_snapshot() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;

        core.master.step().await;

        match a.recv_msg().await {
            ServerMsg::Snapshot {
                tick,
                players,
                shoots,
            } => {
                assert_eq!(tick, 1);
                assert!(players.is_empty());
                assert!(shoots.is_empty());
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    /// Join is answered with an init message carrying the map, and the next
    /// snapshot lists the new player
    #[tokio::test]
    async fn join_yields_init_then_snapshot() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;

        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        match a.recv_msg().await {
            ServerMsg::Init { player_id, map } => {
                assert!(player_id >= 0);
                assert!(map.cols > 0 && map.rows > 0);
                assert_eq!(map.walls.len(), map.rows);
            }
            other => panic!("expected init, got {:?}", other),
        }
        match a.recv_msg().await {
            ServerMsg::Snapshot { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].name, "alice");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    /// Shooting shows up in the following snapshot
    #[tokio::test]
    async fn shoot_appears_in_snapshot() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;

        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        let player_id = match a.recv_msg().await {
            ServerMsg::Init { player_id, .. } => player_id,
            other => panic!("expected init, got {:?}", other),
        };
        let (x, y) = match a.recv_msg().await {
            ServerMsg::Snapshot { players, .. } => (players[0].x, players[0].y),
            other => panic!("expected snapshot, got {:?}", other),
        };

        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Shoot {
                x,
                y,
                dx: 1.0,
                dy: 0.0,
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        match a.recv_msg().await {
            ServerMsg::Snapshot { shoots, .. } => {
                assert_eq!(shoots.len(), 1);
                assert_eq!(shoots[0].player_id, player_id);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    /// Garbage frames are skipped without aborting the tick
    #[tokio::test]
    async fn garbage_frame_does_not_abort_the_tick() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;

        core.handle
            .connection_api(a.id)
            .forward(Bytes::from_static(b"not json"))
            .await
            .unwrap();
        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        assert!(matches!(a.recv_msg().await, ServerMsg::Init { .. }));
        match a.recv_msg().await {
            ServerMsg::Snapshot { players, .. } => assert_eq!(players.len(), 1),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }
}

/// SINGLE-WRITER CONSISTENCY TESTS
mod consistency_tests {
    use super::*;

    /// Commands routed through hub and tick driver produce the same entity
    /// state as applying them sequentially to the simulation directly
    #[tokio::test]
    async fn routed_commands_match_sequential_application() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;
        let b = connect_client(&core.handle).await;

        let ops = [
            (
                a.id,
                ClientMsg::Join {
                    name: "alice".to_string(),
                },
            ),
            (
                b.id,
                ClientMsg::Join {
                    name: "bob".to_string(),
                },
            ),
            (a.id, ClientMsg::Move { dx: 1.0, dy: 0.0 }),
            (a.id, ClientMsg::Move { dx: 0.0, dy: 1.0 }),
            (b.id, ClientMsg::Move { dx: -1.0, dy: 0.0 }),
        ];
        for (client_id, msg) in &ops {
            send_frame(&core.handle, *client_id, msg).await;
        }
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        // Mirror the exact sequence on a fresh simulation with the same seed.
        let mut mirror = GameObjects::new(GameMap::generate(MAP_SEED), MAP_SEED);
        for (client_id, msg) in &ops {
            match msg {
                ClientMsg::Join { name } => {
                    mirror.register_player(*client_id, name);
                }
                ClientMsg::Move { dx, dy } => {
                    if let Some(p) = mirror.get_player_by_client_id(*client_id) {
                        mirror.move_player(p.id, *dx, *dy, PLAYER_SPEED, tick_delta());
                    }
                }
                _ => unreachable!(),
            }
        }
        mirror.update();

        // Compare against the snapshot the routed path broadcast.
        assert!(matches!(a.recv_msg().await, ServerMsg::Init { .. }));
        let routed = match a.recv_msg().await {
            ServerMsg::Snapshot { mut players, .. } => {
                players.sort_by_key(|p| p.id);
                players
            }
            other => panic!("expected snapshot, got {:?}", other),
        };

        let mut expected = mirror.get_players();
        expected.sort_by_key(|p| p.id);

        assert_eq!(routed.len(), expected.len());
        for (got, want) in routed.iter().zip(&expected) {
            assert_eq!(got.id, want.id);
            assert_eq!(got.name, want.name);
            assert!((got.x - want.x).abs() < 1e-4);
            assert!((got.y - want.y).abs() < 1e-4);
        }
    }

    /// Commands left in the queue when a drain starts are deferred, never lost
    #[tokio::test]
    async fn late_commands_apply_on_the_next_tick() {
        let mut core = start_core();
        let mut a = connect_client(&core.handle).await;

        core.master.step().await;
        assert!(matches!(a.recv_msg().await, ServerMsg::Snapshot { .. }));

        send_frame(
            &core.handle,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        sync_hub(&core.handle, &mut a).await;
        core.master.step().await;

        assert!(matches!(a.recv_msg().await, ServerMsg::Init { .. }));
        match a.recv_msg().await {
            ServerMsg::Snapshot { players, .. } => assert_eq!(players.len(), 1),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }
}

/// DIRECT HUB TESTS (bypassing the tick driver)
mod hub_tests {
    use super::*;

    /// A raw hub with no simulation behind it still assigns identities and
    /// fans payloads out
    #[tokio::test]
    async fn bare_hub_broadcast_fan_out() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (hub, handle) = Hub::new(cmd_tx, SendPolicy::Block);
        tokio::spawn(hub.run());

        let mut a = connect_client(&handle).await;
        let mut b = connect_client(&handle).await;

        let payload = Bytes::from_static(b"tick-payload");
        handle.broadcast(payload.clone()).await.unwrap();

        assert_eq!(a.outbound_rx.recv().await.unwrap(), payload);
        assert_eq!(b.outbound_rx.recv().await.unwrap(), payload);
    }

    /// Player count gauge follows the simulation, not the registry
    #[tokio::test]
    async fn player_count_tracks_registered_players() {
        let (state, hub, mut master) = AppState::new(test_config());
        tokio::spawn(hub.run());
        let mut a = connect_client(&state.hub).await;

        send_frame(
            &state.hub,
            a.id,
            &ClientMsg::Join {
                name: "alice".to_string(),
            },
        )
        .await;
        sync_hub(&state.hub, &mut a).await;
        master.step().await;

        assert_eq!(
            state
                .player_count
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
