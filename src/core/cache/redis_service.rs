use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use bb8_redis::redis::{AsyncCommands, Script};
use eyre::Error;
use once_cell::sync::Lazy;

type ConnectionPool = Pool<RedisConnectionManager>;

// KEYS[1] key, ARGV[1] json, ARGV[2] version, ARGV[3] ttl seconds
static SET_IF_NEWER: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local current = redis.call('GET', KEYS[1])
if current then
  local ok, cached = pcall(cjson.decode, current)
  if ok and type(cached) == 'table' then
    local version = tonumber(cached['version'])
    if version and version > tonumber(ARGV[2]) then
      return 0
    end
  end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
",
    )
});

#[derive(Clone)]
pub struct RedisService {
    pool: ConnectionPool,
}

impl RedisService {
    pub async fn connect(redis_url: &str) -> Result<Self, Error> {
        let manager = RedisConnectionManager::new(redis_url)?;
        let pool = bb8::Pool::builder().build(manager).await?;
        Ok(RedisService { pool })
    }

    /// `None` when the key is absent or expired.
    pub async fn get_cache_opt<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let mut conn = self.pool.get().await?;

        let value: Option<String> = conn.get(key).await?;
        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Sets the key only when it does not exist yet. Returns whether it was set.
    pub async fn set_nx_ex_cache<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        expiration: u64,
    ) -> Result<bool, Error> {
        let mut conn = self.pool.get().await?;
        let reply: Option<String> = bb8_redis::redis::cmd("SET")
            .arg(key)
            .arg(serde_json::to_string(value)?)
            .arg("NX")
            .arg("EX")
            .arg(expiration)
            .query_async(&mut *conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Overwrites the key unless the cached JSON carries a top-level
    /// `version` greater than `version`. Returns whether it was written.
    pub async fn set_ex_if_newer<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        version: i64,
        expiration: u64,
    ) -> Result<bool, Error> {
        let mut conn = self.pool.get().await?;
        let written: i64 = SET_IF_NEWER
            .key(key)
            .arg(serde_json::to_string(value)?)
            .arg(version)
            .arg(expiration)
            .invoke_async(&mut *conn)
            .await?;
        Ok(written == 1)
    }
}
