use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

static DATA_DIR_NAME: &str = "quad";
static QUAD_DB_NAME: &str = "quad_db.sqlite";
static CONFIG_FILE_NAME: &str = "config.json";

// For now this directory structure should be like
// data_dir_path
// |- quad
//    |- quad_db.sqlite
//    |- config.json

#[derive(Serialize, Deserialize, Debug)]
pub struct QuadConfig {
    pub(crate) database_path: PathBuf,
}

impl QuadConfig {
    /// Creates a new QuadConfig pointing at the specified data directory
    fn new(data_dir: PathBuf) -> Self {
        QuadConfig {
            database_path: data_dir.join(QUAD_DB_NAME),
        }
    }
}

/// Gets the existing config or initializes a new one if it doesn't exist
pub async fn get_or_init() -> Result<QuadConfig, Box<dyn std::error::Error>> {
    let data_dir = dirs::data_dir().ok_or("failed to find a data directory on this platform")?;

    let quad_dir = data_dir.join(DATA_DIR_NAME);
    let config_path = quad_dir.join(CONFIG_FILE_NAME);

    // Create the quad directory if it doesn't exist
    fs::create_dir_all(&quad_dir).await?;

    // Check if config file exists
    if config_path.exists() {
        // Read and deserialize existing config
        let mut file = fs::File::open(&config_path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let config: QuadConfig = serde_json::from_str(&contents)?;
        Ok(config)
    } else {
        // Create new config
        let config = QuadConfig::new(quad_dir.clone());

        // Serialize and write to file
        let json = serde_json::to_string_pretty(&config)?;
        let mut file = fs::File::create(&config_path).await?;
        file.write_all(json.as_bytes()).await?;

        Ok(config)
    }
}
