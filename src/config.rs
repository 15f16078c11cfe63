/*!
Structs to hold configuration data and global variables.
*/
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::{
    auth,
    school::School,
    store::{AccountStore, Insertion, MemStore, Store},
};

#[derive(Deserialize)]
struct ConfigFile {
    data_db_connect_string: Option<String>,
    in_memory: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    bcrypt_cost: Option<u32>,
    key_length: Option<usize>,
    key_lifetime_secs: Option<u64>,
    seed_schools: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Cfg {
    pub data_db_connect_string: String,
    /// Use a `MemStore` instead of Postgres.
    pub in_memory: bool,
    pub bcrypt_cost: u32,
    pub key_length: usize,
    pub key_lifetime: Duration,
    /// CSV file of schools to insert at startup, if any.
    pub seed_schools: Option<PathBuf>,
    pub addr: SocketAddr,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            data_db_connect_string: "host=localhost user=nest_test password='nest_test' dbname=nest_store_test".to_owned(),
            in_memory: false,
            bcrypt_cost: auth::DEFAULT_BCRYPT_COST,
            key_length: auth::DEFAULT_KEY_LENGTH,
            key_lifetime: auth::DEFAULT_KEY_LIFETIME,
            seed_schools: None,
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8001),
        }
    }
}

impl Cfg {
    pub fn from_toml(file_contents: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.data_db_connect_string {
            c.data_db_connect_string = s;
        }
        if let Some(b) = cf.in_memory {
            c.in_memory = b;
        }
        if let Some(n) = cf.bcrypt_cost {
            if !(4..=31).contains(&n) {
                return Err(format!(
                    "bcrypt_cost must be between 4 and 31, not {}.", n
                ));
            }
            c.bcrypt_cost = n;
        }
        if let Some(n) = cf.key_length {
            if n == 0 {
                return Err("key_length must be positive.".to_owned());
            }
            c.key_length = n;
        }
        if let Some(n) = cf.key_lifetime_secs {
            c.key_lifetime = Duration::from_secs(n);
        }
        if let Some(p) = cf.seed_schools {
            c.seed_schools = Some(p);
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }

        Ok(c)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        Self::from_toml(&file_contents)
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
pub struct Glob {
    pub store: Arc<dyn AccountStore>,
    pub bcrypt_cost: u32,
    pub key_length: usize,
    pub key_lifetime: Duration,
    pub addr: SocketAddr,
}

impl std::fmt::Debug for Glob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Glob")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("key_length", &self.key_length)
            .field("key_lifetime", &self.key_lifetime)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl Glob {
    pub fn new(cfg: &Cfg, store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            bcrypt_cost: cfg.bcrypt_cost,
            key_length: cfg.key_length,
            key_lifetime: cfg.key_lifetime,
            addr: cfg.addr,
        }
    }
}

/// Insert every school in the CSV file at `path` that isn't already there.
///
/// Returns the number actually inserted.
pub async fn seed_schools<P: AsRef<Path>>(
    store: &dyn AccountStore,
    path: P,
) -> Result<usize, String> {
    let path = path.as_ref();
    log::trace!("seed_schools( {} ) called.", path.display());

    let f = std::fs::File::open(path)
        .map_err(|e| format!("Unable to open {}: {}", path.display(), &e))?;
    let schools = School::vec_from_csv_reader(f)
        .map_err(|e| format!("Error reading {}: {}", path.display(), &e))?;

    let mut n_inserted: usize = 0;
    for school in schools.iter() {
        match store.insert_school(school).await {
            Ok(Insertion::Inserted) => { n_inserted += 1; },
            Ok(Insertion::Duplicate) => {
                log::trace!("School {:?} already present.", &school.abbr);
            },
            Err(e) => {
                return Err(format!("Error inserting school {:?}: {}", &school.abbr, &e));
            },
        }
    }

    Ok(n_inserted)
}

/// Loads system configuration and ensures all appropriate database tables
/// exist.
///
/// A missing config file isn't an error; the defaults get used.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let path = path.as_ref();
    let cfg = if path.exists() {
        let cfg = Cfg::from_file(path)?;
        log::info!("Configuration file read:\n{:#?}", &cfg);
        cfg
    } else {
        log::warn!(
            "Config file {} not found; using default configuration.",
            path.display()
        );
        Cfg::default()
    };

    let store: Arc<dyn AccountStore> = if cfg.in_memory {
        log::warn!("Using in-memory store; nothing will persist.");
        Arc::new(MemStore::new())
    } else {
        Arc::new(Store::new(cfg.data_db_connect_string.clone()))
    };

    log::trace!("Checking state of data DB...");
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of data DB: {}", &e);
        return Err(estr);
    }
    log::trace!("...data DB okay.");

    if let Some(seed_path) = &cfg.seed_schools {
        let n = seed_schools(store.as_ref(), seed_path).await?;
        log::info!("Inserted {} schools from {}.", &n, seed_path.display());
    }

    let schools = store.get_schools().await
        .map_err(|e| format!("Error retrieving schools from data DB: {}", &e))?;
    log::info!("{} schools in data DB.", &schools.len());

    Ok(Glob::new(&cfg, store))
}
