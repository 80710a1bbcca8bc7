use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub sms_sender: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let sms_sender = env::var("SMS_SENDER").unwrap_or_else(|_| "CareTake".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            sms_sender,
        })
    }
}
