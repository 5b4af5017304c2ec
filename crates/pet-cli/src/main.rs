use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use contracts::{EngineConfig, ImageResult, TickOutcome};
use pet_api::{serve, HttpImageProvider, ImageSource, PresenterApi, DEFAULT_IMAGE_ENDPOINT};

fn print_usage() {
    println!("pet-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  acquire [endpoint]");
    println!("    fetches a random image and acquires it as the active pet");
    println!("  favorites [sqlite_path]");
    println!("    lists favorites persisted in the sqlite store");
    println!("  simulate <seed> [ticks]");
    println!("    runs a deterministic offline session and prints a summary");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {}: {}", label, raw))
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    env::var("FRENZY_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "frenzy_favorites.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn image_endpoint(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .or_else(|| env::var("FRENZY_IMAGE_ENDPOINT").ok())
        .filter(|endpoint| !endpoint.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_ENDPOINT.to_string())
}

fn special_marker(is_special: bool) -> &'static str {
    if is_special {
        " (special)"
    } else {
        ""
    }
}

fn print_status() {
    let api = PresenterApi::from_config(EngineConfig::default());
    match serde_json::to_string_pretty(&api.snapshot()) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: failed to render snapshot: {err}"),
    }
}

async fn run_acquire(endpoint: String) -> Result<(), String> {
    let provider = HttpImageProvider::new(endpoint);
    let candidate = provider
        .fetch_random()
        .await
        .map_err(|err| err.to_string())?;

    let mut api = PresenterApi::from_config(EngineConfig::default());
    let pet = api
        .acquire_pet(&candidate)
        .map_err(|err| err.to_string())?;
    let snapshot = api.snapshot();

    println!(
        "acquired {}{} from {}",
        pet.name,
        special_marker(pet.is_special),
        pet.image_url
    );
    println!("coins={} hunger={:.3}", snapshot.coins, snapshot.hunger);
    Ok(())
}

fn run_favorites(args: &[String]) -> Result<(), String> {
    let path = parse_sqlite_path(args.get(2));
    let mut api = PresenterApi::from_config(EngineConfig::default());
    api.attach_sqlite_store(PathBuf::from(&path))
        .map_err(|err| err.to_string())?;

    if api.favorites().is_empty() {
        println!("no favorites saved in {path}");
        return Ok(());
    }
    for pet in api.favorites() {
        println!("{}{}  {}", pet.name, special_marker(pet.is_special), pet.image_url);
    }
    Ok(())
}

/// Offline deterministic session: acquire one pet, tick forward, feed on
/// every hunger warning, and apply the cooldown completion in tick units.
fn run_simulation(args: &[String]) -> Result<(), String> {
    let seed = parse_u64(args.get(2), "seed")?;
    let ticks = args
        .get(3)
        .map(|value| parse_u64(Some(value), "ticks"))
        .transpose()?
        .unwrap_or(180);

    let mut config = EngineConfig::default();
    config.seed = seed;
    let cooldown_ticks = (config.feeding_cooldown_ms / config.tick_interval_ms).max(1);

    let mut api = PresenterApi::from_config(config);
    let pet = api
        .acquire_pet(&ImageResult {
            id: "sim_0".to_string(),
            url: "sim://pet/0".to_string(),
        })
        .map_err(|err| err.to_string())?;

    let mut warnings = 0u64;
    let mut feeds = 0u64;
    let mut pending_cooldown: Option<(u64, u64)> = None;

    for tick in 1..=ticks {
        if let Some((due_tick, generation)) = pending_cooldown {
            if tick >= due_tick {
                api.end_feeding(generation);
                pending_cooldown = None;
            }
        }

        if api.tick() == TickOutcome::BecameHungry {
            warnings += 1;
            if let Ok(started) = api.feed() {
                feeds += 1;
                pending_cooldown = Some((tick + cooldown_ticks, started.generation));
            }
        }
    }

    let snapshot = api.snapshot();
    println!(
        "simulated seed={} pet={}{} ticks={} warnings={} feeds={} coins={} hunger={:.3}",
        seed,
        pet.name,
        special_marker(pet.is_special),
        ticks,
        warnings,
        feeds,
        snapshot.coins,
        snapshot.hunger
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => {
            print_status();
        }
        Some("acquire") => {
            let endpoint = image_endpoint(args.get(2));
            if let Err(err) = run_acquire(endpoint).await {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        }
        Some("favorites") => {
            if let Err(err) = run_favorites(&args) {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        }
        Some("simulate") => {
            if let Err(err) = run_simulation(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let sqlite_path = parse_sqlite_path(args.get(3));
                let source = ImageSource::http(image_endpoint(None));
                println!("serving api on http://{addr}");
                if let Err(err) = serve(
                    addr,
                    EngineConfig::default(),
                    source,
                    Some(PathBuf::from(sqlite_path)),
                )
                .await
                {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        _ => {
            print_usage();
        }
    }
}
