use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::Config;
use crate::core::db::{init_test_data, JsonFileStore, UserStore};

pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenService) -> Arc<Self> {
        Arc::new(Self { store, tokens })
    }

    /// Opens the JSON datastore named by `config` and seeds demo data when
    /// asked to.
    pub fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let store = JsonFileStore::open(&config.db_path)?;
        if config.seed_demo {
            init_test_data(&store)?;
        }
        let tokens = TokenService::new(&config.access_token_secret, &config.refresh_token_secret);
        Ok(Self::new(Arc::new(store), tokens))
    }
}
