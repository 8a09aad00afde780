use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    templates_root: String,
    public_root: String,
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_pool_capacity")]
    pool_capacity: usize,
}

fn default_pool_capacity() -> usize {
    32
}

impl Config {
    pub fn new() -> Self {
        Self {
            templates_root: "templates".to_string(),
            public_root: "public".to_string(),
            port: 7878,
            worker_threads: 0,
            local: true,
            pool_capacity: default_pool_capacity(),
        }
    }

    pub fn from_toml(filename: &str) -> Self {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => panic!("no such file {} exception:{}", filename, e),
        };
        let mut str_val = String::new();
        match file.read_to_string(&mut str_val) {
            Ok(s) => s,
            Err(e) => panic!("Error Reading file: {}", e),
        };

        let mut raw_config: Config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.pool_capacity == 0 {
            warn!("pool_capacity被设置为0，但缓冲池不支持零容量，因此该值将被改为32。");
            raw_config.pool_capacity = default_pool_capacity();
        }
        raw_config
    }
}

impl Config {
    pub fn templates_root(&self) -> &str {
        &self.templates_root
    }

    pub fn public_root(&self) -> &str {
        &self.public_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }
}
