use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns false once `limit` requests have
    /// been seen inside the current window.
    ///
    /// INCR and EXPIRE run in one script: applied separately, a crash
    /// between them leaves a counter with no TTL that limits the key
    /// forever.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            local count = redis.call("INCR", KEYS[1])
            if count == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return count
        "#,
        );

        let count: i64 = script
            .key(key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(count <= limit)
    }
}
