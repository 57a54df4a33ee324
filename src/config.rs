use crate::barrier::WaitStrategy;
use anyhow::{anyhow, ensure, Context, Result};
use hocon::{Hocon, HoconLoader};
use std::{collections::HashMap, path::Path, time::Duration};

pub const DEFAULT_STORE_SIZE: usize = 4_000_000;
pub const DEFAULT_WORKLOAD: usize = 100_000;
pub const DEFAULT_RECORD_SIZE: usize = 5;

const ENV_PREFIX: &str = "TXLOAD_";

/// Looks up settings in the environment first, then in the scoped section of an optional
/// HOCON file, then at the root of that file.
///
/// A setting `foo_bar` is overridden by the environment variable `TXLOAD_FOO_BAR`.
#[derive(Debug)]
pub struct ConfigLoader {
    hocon: Option<Hocon>,
    env: HashMap<String, String>,
    scope: String,
}

impl ConfigLoader {
    pub fn new(path: Option<&Path>, scope: &str) -> Result<Self> {
        Self::with_env(path, scope, std::env::vars().collect())
    }

    pub fn with_env(
        path: Option<&Path>,
        scope: &str,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let hocon = match path {
            Some(path) => {
                ensure!(path.is_file(), "The config file {:?} was not found", path);

                let hocon = HoconLoader::new()
                    .load_file(path)
                    .with_context(|| format!("Failed to load config file at: {:?}", path))?
                    .hocon()
                    .with_context(|| format!("Failed to parse config file at: {:?}", path))?;

                Some(hocon)
            }
            None => None,
        };

        Ok(Self {
            hocon,
            env,
            scope: scope.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let env_name = format!("{}{}", ENV_PREFIX, name.to_ascii_uppercase());
        if let Some(value) = self.env.get(&env_name) {
            return Some(Value::String(value.clone()));
        }

        let hocon = self.hocon.as_ref()?;
        let scope = &hocon[self.scope.as_str()];
        if matches!(scope, Hocon::Hash(_)) {
            if let Some(value) = Self::map_hocon(scope, name) {
                return Some(value);
            }
        }

        Self::map_hocon(hocon, name)
    }

    pub fn load<T: Config>(&self) -> Result<T> {
        T::load(self)
    }

    fn map_hocon(hocon: &Hocon, name: &str) -> Option<Value> {
        match &hocon[name] {
            Hocon::Integer(value) if *value >= 0 => Some(Value::Integer(*value as usize)),
            Hocon::Integer(value) => Some(Value::String(value.to_string())),
            Hocon::String(value) => Some(Value::String(value.clone())),
            Hocon::Boolean(value) => Some(Value::Boolean(*value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(usize),
    Boolean(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(val) => Some(*val),
            Value::String(val) => match val.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            Value::Integer(_) => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Integer(val) => Some(*val),
            Value::String(val) => val.parse::<usize>().ok(),
            Value::Boolean(_) => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(val) => Some(val.clone()),
            Value::Boolean(val) => Some(val.to_string()),
            Value::Integer(val) => Some(val.to_string()),
        }
    }
}

pub trait Config {
    fn load(config: &ConfigLoader) -> Result<Self>
    where
        Self: Sized;
}

/// Everything that shapes a run. The defaults reproduce the classic stress test:
/// a 4 MB store, 100000 five field records and 100000 transactions per worker,
/// with every worker held at the start barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub store_size: usize,
    /// Records created before any worker starts.
    pub records: usize,
    /// Transactions each worker runs.
    pub iterations: usize,
    pub record_size: usize,
    /// Log worker start and stop at info level rather than debug.
    pub chatty: bool,
    /// Hold workers at the start barrier until all of them are ready.
    pub sync_start: bool,
    pub wait_strategy: WaitStrategy,
    /// Give up waiting for the quorum after this long. `None` waits forever.
    pub quorum_timeout: Option<Duration>,
    pub stack_size: Option<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            store_size: DEFAULT_STORE_SIZE,
            records: DEFAULT_WORKLOAD,
            iterations: DEFAULT_WORKLOAD,
            record_size: DEFAULT_RECORD_SIZE,
            chatty: true,
            sync_start: true,
            wait_strategy: WaitStrategy::Blocking,
            quorum_timeout: None,
            stack_size: None,
        }
    }
}

impl Config for HarnessConfig {
    fn load(config: &ConfigLoader) -> Result<Self> {
        let defaults = Self::default();

        let wait_strategy = match setting(config, "wait_strategy", Value::as_string)? {
            Some(strategy) => strategy.parse().map_err(|err: String| anyhow!(err))?,
            None => defaults.wait_strategy,
        };

        let record_size =
            setting(config, "record_size", Value::as_usize)?.unwrap_or(defaults.record_size);
        ensure!(record_size > 0, "record_size must be at least 1");

        Ok(Self {
            store_size: setting(config, "store_size", Value::as_usize)?
                .unwrap_or(defaults.store_size),
            records: setting(config, "records", Value::as_usize)?.unwrap_or(defaults.records),
            iterations: setting(config, "iterations", Value::as_usize)?
                .unwrap_or(defaults.iterations),
            record_size,
            chatty: setting(config, "chatty", Value::as_bool)?.unwrap_or(defaults.chatty),
            sync_start: setting(config, "sync_start", Value::as_bool)?
                .unwrap_or(defaults.sync_start),
            wait_strategy,
            quorum_timeout: setting(config, "quorum_timeout_ms", Value::as_usize)?
                .filter(|ms| *ms > 0)
                .map(|ms| Duration::from_millis(ms as u64)),
            stack_size: setting(config, "stack_size", Value::as_usize)?.filter(|size| *size > 0),
        })
    }
}

/// A setting that is present must convert, an absent one is `None`.
fn setting<T>(
    config: &ConfigLoader,
    name: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>> {
    match config.get(name) {
        Some(value) => convert(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("Invalid value {:?} for setting `{}`", value, name)),
        None => Ok(None),
    }
}
