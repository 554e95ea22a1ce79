use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fotomatch_core::{
    codec, metric, Embedding, FaceMatcher, MatchConfig, PhotoFaceCandidate, PhotoFaces,
    DEFAULT_MATCH_THRESHOLD,
};

#[derive(Parser)]
#[command(name = "fotomatch", about = "fotomatch face-matching CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON array of numbers into an embedding token
    Encode {
        /// Path to a JSON file containing an array of numbers
        values: PathBuf,
    },
    /// Decode an embedding token back into a JSON array
    Decode {
        /// Embedding token as produced by `encode`
        token: String,
    },
    /// Compare two embedding tokens
    Compare {
        token_a: String,
        token_b: String,
        /// Maximum distance at which the pair counts as the same person
        #[arg(short, long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f64,
    },
    /// Rank stored face candidates against a target embedding
    Match {
        /// Target embedding token
        #[arg(short, long)]
        target: String,
        /// JSON file with an array of {photo_id, face_id, embedding} rows
        #[arg(short, long)]
        candidates: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f64,
    },
    /// Find the photos a person appears in
    FindPhotos {
        /// Target embedding token
        #[arg(short, long)]
        target: String,
        /// JSON file with an array of {photo_id, faces} rows
        #[arg(short, long)]
        photos: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { values } => {
            let embedding = read_values(&values)?;
            println!("{}", codec::encode(&embedding));
        }
        Commands::Decode { token } => {
            let embedding = codec::decode(&token)?;
            println!("{}", serde_json::to_string(&embedding)?);
        }
        Commands::Compare {
            token_a,
            token_b,
            threshold,
        } => {
            let a = codec::decode(&token_a).context("decoding first token")?;
            let b = codec::decode(&token_b).context("decoding second token")?;
            // Validates the threshold the same way the service would
            let config = MatchConfig::new(a.len().max(1), threshold)?;

            let distance = a.distance(&b)?;
            let report = serde_json::json!({
                "distance": distance,
                "confidence": metric::confidence_from_distance(distance),
                "display_confidence": metric::display_confidence(distance, config.threshold()),
                "matched": distance <= config.threshold(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Match {
            target,
            candidates,
            threshold,
        } => {
            let target = codec::decode(&target).context("decoding target token")?;
            let candidates: Vec<PhotoFaceCandidate> = read_json(&candidates)?;

            let matcher = matcher_for(&target, threshold)?;
            let results = matcher.match_faces(&target, &candidates)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::FindPhotos {
            target,
            photos,
            threshold,
        } => {
            let target = codec::decode(&target).context("decoding target token")?;
            let photos: Vec<PhotoFaces> = read_json(&photos)?;

            let matcher = matcher_for(&target, threshold)?;
            let results = matcher.find_matching_photos(&target, &photos)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Build a matcher whose expected dimensionality is the target's own length.
fn matcher_for(target: &Embedding, threshold: f64) -> Result<FaceMatcher> {
    let config = MatchConfig::new(target.len(), threshold)
        .context("target token decodes to an unusable embedding")?;
    Ok(FaceMatcher::new(config))
}

fn read_values(path: &Path) -> Result<Embedding> {
    let values: Vec<f64> = read_json(path)?;
    Ok(Embedding::new(values))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
