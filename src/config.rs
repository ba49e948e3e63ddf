//! Application-level configuration loading: content pools, timings and the public join URL.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    assign::ContentPools,
    game::{SeatIndex, SessionCode, Symbol, Variant, Word},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_SYNC_CONFIG_PATH";
const DEFAULT_GUESS_TIMER_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pools: ContentPools,
    guess_timer: Duration,
    poll_interval: Duration,
    public_base_url: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in content pools.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        impostor_words = app_config.pools.impostor_words.len(),
                        charades_words = app_config.pools.charades_words.len(),
                        characters = app_config.pools.characters.len(),
                        "loaded content pools from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    pub fn pools(&self) -> &ContentPools {
        &self.pools
    }

    /// Countdown given to a charades guesser before the turn is forfeited.
    pub fn guess_timer(&self) -> Duration {
        self.guess_timer
    }

    /// Interval of the reconciliation poll that backs up change notifications.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Replace the content pools, keeping every other setting.
    pub fn with_pools(mut self, pools: ContentPools) -> Self {
        self.pools = pools;
        self
    }

    /// Override the reconciliation timings.
    pub fn with_timings(mut self, guess_timer: Duration, poll_interval: Duration) -> Self {
        self.guess_timer = guess_timer;
        self.poll_interval = poll_interval;
        self
    }

    /// Link a device opens to join `code`, carrying its seat once one is claimed.
    pub fn join_url(&self, variant: Variant, code: &SessionCode, seat: Option<SeatIndex>) -> String {
        let base = self.public_base_url.trim_end_matches('/');
        match seat {
            Some(seat) => format!("{base}/{}/{code}?p={seat}", variant.slug()),
            None => format!("{base}/{}/{code}", variant.slug()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pools: default_pools(),
            guess_timer: Duration::from_secs(DEFAULT_GUESS_TIMER_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing ones keep their built-in value.
struct RawConfig {
    #[serde(default)]
    impostor_words: Option<Vec<String>>,
    #[serde(default)]
    charades_words: Option<Vec<RawWord>>,
    #[serde(default)]
    characters: Option<Vec<RawWord>>,
    #[serde(default)]
    casino_symbols: Option<Vec<String>>,
    #[serde(default)]
    guess_timer_secs: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    public_base_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let words = |raw: Option<Vec<RawWord>>, fallback: Vec<Word>| {
            raw.map(|entries| entries.into_iter().map(Into::into).collect())
                .unwrap_or(fallback)
        };

        let pools = ContentPools {
            impostor_words: value
                .impostor_words
                .map(|entries| entries.into_iter().map(Word::plain).collect())
                .unwrap_or(defaults.pools.impostor_words),
            charades_words: words(value.charades_words, defaults.pools.charades_words),
            characters: words(value.characters, defaults.pools.characters),
            casino_palette: value
                .casino_symbols
                .map(|entries| entries.into_iter().map(Symbol).collect())
                .unwrap_or(defaults.pools.casino_palette),
        };

        Self {
            pools,
            guess_timer: value
                .guess_timer_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.guess_timer),
            poll_interval: value
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            public_base_url: value.public_base_url.unwrap_or(defaults.public_base_url),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a pool entry: either a bare string or `{ "text", "category" }`.
#[serde(untagged)]
enum RawWord {
    Plain(String),
    Categorized { text: String, category: String },
}

impl From<RawWord> for Word {
    fn from(value: RawWord) -> Self {
        match value {
            RawWord::Plain(text) => Word::plain(text),
            RawWord::Categorized { text, category } => Word::categorized(text, category),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in pools shipped with the binary.
fn default_pools() -> ContentPools {
    fn categorized(entries: &[(&str, &str)]) -> Vec<Word> {
        entries
            .iter()
            .map(|(text, category)| Word::categorized(*text, *category))
            .collect()
    }

    ContentPools {
        impostor_words: [
            "lighthouse",
            "submarine",
            "volcano",
            "library",
            "circus",
            "hospital",
            "airport",
            "bakery",
            "castle",
            "desert",
            "museum",
            "stadium",
            "spaceship",
            "jungle",
            "casino",
            "prison",
        ]
        .into_iter()
        .map(Word::plain)
        .collect(),
        charades_words: categorized(&[
            ("giraffe", "animals"),
            ("penguin", "animals"),
            ("kangaroo", "animals"),
            ("octopus", "animals"),
            ("umbrella", "objects"),
            ("toothbrush", "objects"),
            ("scissors", "objects"),
            ("telescope", "objects"),
            ("swimming", "actions"),
            ("juggling", "actions"),
            ("sneezing", "actions"),
            ("skiing", "actions"),
            ("firefighter", "professions"),
            ("dentist", "professions"),
            ("photographer", "professions"),
            ("pilot", "professions"),
        ]),
        characters: categorized(&[
            ("Sherlock Holmes", "fiction"),
            ("Harry Potter", "fiction"),
            ("Dracula", "fiction"),
            ("Robin Hood", "fiction"),
            ("Cleopatra", "history"),
            ("Napoleon", "history"),
            ("Joan of Arc", "history"),
            ("Albert Einstein", "science"),
            ("Marie Curie", "science"),
            ("Mickey Mouse", "cartoons"),
            ("SpongeBob", "cartoons"),
            ("Shrek", "cartoons"),
        ]),
        casino_palette: ["🍒", "🍋", "🍊", "🍇", "⭐", "🔔", "7️⃣", "💎"]
            .into_iter()
            .map(|symbol| Symbol(symbol.into()))
            .collect(),
    }
}
