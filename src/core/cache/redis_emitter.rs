use redis::Client;
use socketio_rust_emitter::Emitter;

const MAX_EMIT_ATTEMPTS: usize = 3;

/// Socket.IO redis-adapter emitter. Every socket server subscribed to the same
/// Redis fans the event out to the sockets joined to the room.
#[derive(Clone)]
pub struct RedisEmitter {
    pub client: Client,
    pub emitter: Emitter,
}

impl RedisEmitter {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let emitter = Emitter::new(client.clone());

        Ok(Self { client, emitter })
    }

    /// Blocking; call from `spawn_blocking`.
    pub fn emit_room(&self, room: &str, event: &str, data: &str) -> Result<(), String> {
        let mut attempts = 0;
        loop {
            // The emitter panics on connection errors instead of returning them.
            let result = std::panic::catch_unwind({
                let emitter = self.emitter.clone();
                let room = room.to_string();
                let event = event.to_string();
                let data = data.to_string();
                move || {
                    emitter.to(&room).emit(vec![&event, &data]);
                }
            });

            if result.is_ok() {
                return Ok(());
            }

            attempts += 1;
            if attempts >= MAX_EMIT_ATTEMPTS {
                return Err(format!(
                    "Send event {event:?} to room {room:?} failed after {MAX_EMIT_ATTEMPTS} attempts"
                ));
            }
        }
    }
}
