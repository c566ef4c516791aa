use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use cartomc_storage::manager::{MapStorage, StorageMode, StorageSettings};
use cartomc_storage::realtime::RealtimeKind;
use cartomc_storage::{config, TileKey, TileStore, TILE_SIZE};

mod simulate;

#[derive(Parser)]
#[command(name = "cartomc", about = "Tile storage and render progress tooling for Minecraft world maps")]
pub struct Args {
    /// Directory holding database.properties
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Root of the on-disk tile tree (file storage)
    #[arg(long, env = "TILES_DIR", default_value = "tiles")]
    pub tiles_dir: PathBuf,

    /// Storage mode: "file", "database" or "memory"
    #[arg(short, long, env = "STORAGE", default_value = "file")]
    pub storage: StorageMode,

    /// Overrides the url in database.properties
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Warning logged when a corrupted tile file is deleted; `{png}` is the file name
    #[arg(long, env = "CORRUPTED_TILE_MESSAGE")]
    pub corrupted_tile_message: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install database.properties and, in database mode, create the schema
    Init,
    /// Read or write a single tile
    Tile {
        #[command(subcommand)]
        action: TileAction,
    },
    /// Read or write the live players/markers documents (database mode)
    Realtime {
        #[command(subcommand)]
        action: RealtimeAction,
    },
    /// Run a synthetic render that writes tiles and reports progress
    Simulate(simulate::SimulateArgs),
}

#[derive(Subcommand)]
pub enum TileAction {
    /// Export a tile as PNG (blank if it was never rendered)
    #[command(allow_negative_numbers = true)]
    Get {
        world: String,
        x: i32,
        z: i32,
        output: PathBuf,
        #[arg(long, default_value = "0")]
        zoom: i32,
    },
    /// Import a PNG as a tile
    #[command(allow_negative_numbers = true)]
    Put {
        world: String,
        x: i32,
        z: i32,
        input: PathBuf,
        #[arg(long, default_value = "0")]
        zoom: i32,
    },
}

#[derive(Subcommand)]
pub enum RealtimeAction {
    /// Print the stored document
    Get { kind: RealtimeKind },
    /// Replace the stored document; must be valid JSON
    Set { kind: RealtimeKind, json: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Command::Init = args.command {
        let path = config::install_default(&args.data_dir)?;
        println!("Database config: {}", path.display());
    }

    let settings = StorageSettings {
        mode: args.storage,
        tiles_dir: args.tiles_dir.clone(),
        data_dir: args.data_dir.clone(),
        database_url: args.database_url.clone(),
        corrupted_tile_message: args.corrupted_tile_message.clone(),
    };
    let mut storage = setup_with_retry(&settings).await?;

    let result = run(&args.command, &storage).await;
    storage.shutdown().await;
    result
}

async fn setup_with_retry(settings: &StorageSettings) -> Result<MapStorage> {
    let mut storage = MapStorage::new();
    // Retry loop for DB connection
    for i in 0..30 {
        match storage.setup(settings).await {
            Ok(()) => return Ok(storage),
            Err(e) if e.is_retryable() && i < 29 => {
                eprintln!("Failed to connect to storage: {}. Retrying {}/30 in 2s...", e, i + 1);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e).context("Storage setup failed"),
        }
    }
    bail!("Could not connect to storage after 30 retries")
}

async fn run(command: &Command, storage: &MapStorage) -> Result<()> {
    let tiles = storage.tiles().context("Storage is not running")?;

    match command {
        Command::Init => {
            if let Some(db) = storage.database() {
                println!("Database ready ({:?}), schema in place", db.dialect());
            } else {
                println!("Storage mode has no schema to create");
            }
        }
        Command::Tile { action } => run_tile(action, tiles.as_ref()).await?,
        Command::Realtime { action } => {
            let realtime = storage
                .realtime()
                .context("Realtime data needs database storage (--storage database)")?;
            match action {
                RealtimeAction::Get { kind } => println!("{}", realtime.get_realtime_data(*kind).await),
                RealtimeAction::Set { kind, json } => {
                    serde_json::from_str::<serde_json::Value>(json).context("Realtime data must be valid JSON")?;
                    realtime.set_realtime_data(*kind, json).await?;
                }
            }
        }
        Command::Simulate(sim) => simulate::run(sim, tiles).await?,
    }
    Ok(())
}

async fn run_tile(action: &TileAction, tiles: &dyn TileStore) -> Result<()> {
    match action {
        TileAction::Get { world, x, z, output, zoom } => {
            let key = TileKey::new(world.as_str(), *x, *z, *zoom);
            let image = tiles.load(&key).await;
            image
                .save(output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Tile {} written to {}", key, output.display());
        }
        TileAction::Put { world, x, z, input, zoom } => {
            let key = TileKey::new(world.as_str(), *x, *z, *zoom);
            let image = image::open(input)
                .with_context(|| format!("Failed to read {}", input.display()))?
                .into_rgba8();
            if image.dimensions() != (TILE_SIZE, TILE_SIZE) {
                bail!(
                    "{} is {}x{}, tiles must be {}x{}",
                    input.display(),
                    image.width(),
                    image.height(),
                    TILE_SIZE,
                    TILE_SIZE
                );
            }
            tiles.save(&image, &key).await?;
            println!("Tile {} stored", key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_negative_coords() {
        let args = Args::try_parse_from(["cartomc", "--storage", "memory", "tile", "get", "world", "-3", "7", "out.png"])
            .unwrap();
        assert_eq!(args.storage, StorageMode::Memory);
        match args.command {
            Command::Tile { action: TileAction::Get { x, z, zoom, .. } } => {
                assert_eq!((x, z, zoom), (-3, 7, 0));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_args_parse_corrupted_tile_message() {
        let args = Args::try_parse_from([
            "cartomc",
            "--corrupted-tile-message",
            "bad {png}",
            "tile",
            "get",
            "world",
            "0",
            "0",
            "out.png",
        ])
        .unwrap();
        assert_eq!(args.corrupted_tile_message.as_deref(), Some("bad {png}"));
    }

    #[test]
    fn test_args_parse_realtime() {
        let args = Args::try_parse_from(["cartomc", "-s", "db", "realtime", "set", "players", "{}"]).unwrap();
        assert_eq!(args.storage, StorageMode::Database);
        assert!(matches!(
            args.command,
            Command::Realtime { action: RealtimeAction::Set { kind: RealtimeKind::Players, .. } }
        ));
    }

    #[tokio::test]
    async fn test_tile_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage_settings = StorageSettings {
            mode: StorageMode::File,
            tiles_dir: dir.path().join("tiles"),
            data_dir: dir.path().join("data"),
            database_url: None,
            corrupted_tile_message: None,
        };
        let storage = setup_with_retry(&storage_settings).await.unwrap();

        let input = dir.path().join("in.png");
        let mut tile = cartomc_storage::blank_tile();
        tile.put_pixel(10, 20, image::Rgba([1, 2, 3, 255]));
        tile.save(&input).unwrap();

        let put = TileAction::Put { world: "world".into(), x: -1, z: 2, input, zoom: 1 };
        run_tile(&put, storage.tiles().unwrap().as_ref()).await.unwrap();

        let output = dir.path().join("out.png");
        let get = TileAction::Get { world: "world".into(), x: -1, z: 2, output: output.clone(), zoom: 1 };
        run_tile(&get, storage.tiles().unwrap().as_ref()).await.unwrap();
        assert_eq!(image::open(&output).unwrap().into_rgba8(), tile);
    }
}
