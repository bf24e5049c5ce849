//! `veriface`: headless identity capture and enrollment.
//!
//! # Usage
//!
//! ```text
//! veriface verify --document aadhaar.jpg --face face.jpg
//! veriface signup --document aadhaar.jpg --face face.jpg --email asha@example.com
//! veriface login --email asha@example.com
//! veriface whoami --session <token>
//! veriface logout --session <token>
//! ```
//!
//! The face image stands in for the camera: it is served as every frame.
//! `signup` fills in coordinates from an IP lookup unless `--lat` and `--lng`
//! are both given or `--no-locate` is set.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use veriface_capture::{
  CaptureEvent, CaptureOrchestrator, VerificationState,
  client::{ApiConfig, DEFAULT_COOKIE_NAME, EnrollmentClient, Session},
  document::DocumentFile,
  gateway::HttpVerificationGateway,
  geo::{self, DEFAULT_GEOLOCATION_URL, GeoLocator},
  still::StillImageCamera,
};
use veriface_core::{enrollment::Credentials, identity::Coordinates};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "veriface", about = "Identity-verified enrollment from the terminal")]
struct Args {
  /// Path to a TOML config file (api_url, gateway_url, geolocation_url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the veriface server (default: http://localhost:3000).
  #[arg(long, env = "VERIFACE_API_URL")]
  api_url: Option<String>,

  /// Upload endpoint of the verification gateway
  /// (default: http://127.0.0.1:5000/upload).
  #[arg(long, env = "VERIFACE_GATEWAY_URL")]
  gateway_url: Option<String>,

  /// IP geolocation service queried at signup
  /// (default: https://ipapi.co/json/).
  #[arg(long, env = "VERIFACE_GEOLOCATION_URL")]
  geolocation_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Verify a document against a face image and print the extracted profile.
  Verify(CaptureArgs),
  /// Verify, then create an account and print its session token.
  Signup(SignupArgs),
  /// Log in and print a session token.
  Login {
    #[arg(long)]
    email:    String,
    #[arg(long, env = "VERIFACE_PASSWORD")]
    password: String,
  },
  /// End a session.
  Logout {
    #[arg(long, env = "VERIFACE_SESSION")]
    session: String,
  },
  /// Show the identity behind a session.
  Whoami {
    #[arg(long, env = "VERIFACE_SESSION")]
    session: String,
  },
}

#[derive(ClapArgs, Debug)]
struct CaptureArgs {
  /// Identity document image.
  #[arg(long)]
  document: PathBuf,
  /// Face image used as the camera frame.
  #[arg(long)]
  face:     PathBuf,
}

#[derive(ClapArgs, Debug)]
struct SignupArgs {
  #[command(flatten)]
  capture:   CaptureArgs,
  #[arg(long)]
  email:     String,
  #[arg(long, env = "VERIFACE_PASSWORD")]
  password:  String,
  /// Optional wallet address stored with the identity.
  #[arg(long)]
  wallet:    Option<String>,
  /// Latitude; overrides the IP lookup.
  #[arg(long)]
  lat:       Option<f64>,
  /// Longitude; overrides the IP lookup.
  #[arg(long)]
  lng:       Option<f64>,
  /// Skip the IP geolocation lookup.
  #[arg(long)]
  no_locate: bool,
  /// Override the extracted full name.
  #[arg(long)]
  name:      Option<String>,
  /// Override the extracted date of birth.
  #[arg(long)]
  dob:       Option<String>,
  /// Override the extracted address.
  #[arg(long)]
  address:   Option<String>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  api_url:         String,
  #[serde(default)]
  gateway_url:     String,
  #[serde(default)]
  geolocation_url: String,
  #[serde(default)]
  cookie_name:     String,
}

struct Settings {
  api_url:         String,
  gateway_url:     String,
  geolocation_url: String,
  cookie_name:     String,
}

fn pick(flag: Option<String>, file: &str, default: &str) -> String {
  flag
    .or_else(|| (!file.is_empty()).then(|| file.to_owned()))
    .unwrap_or_else(|| default.to_owned())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let settings = Settings {
    api_url:         pick(args.api_url, &file_cfg.api_url, "http://localhost:3000"),
    gateway_url:     pick(args.gateway_url, &file_cfg.gateway_url, "http://127.0.0.1:5000/upload"),
    geolocation_url: pick(
      args.geolocation_url,
      &file_cfg.geolocation_url,
      DEFAULT_GEOLOCATION_URL,
    ),
    cookie_name:     pick(None, &file_cfg.cookie_name, DEFAULT_COOKIE_NAME),
  };

  match args.command {
    Command::Verify(capture) => {
      let orch = verify(&settings, &capture).await?;
      if let VerificationState::Verified(profile) = orch.state() {
        println!("name:          {}", profile.full_name);
        println!("date of birth: {}", profile.date_of_birth);
        println!("address:       {}", profile.address);
      }
    }
    Command::Signup(signup) => {
      let mut orch = verify(&settings, &signup.capture).await?;
      orch.amend_profile(|profile| {
        if let Some(name) = signup.name {
          profile.full_name = name;
        }
        if let Some(dob) = signup.dob {
          profile.date_of_birth = dob;
        }
        if let Some(address) = signup.address {
          profile.address = address;
        }
      })?;
      let explicit = Coordinates { lat: signup.lat, lng: signup.lng };
      let located = if signup.no_locate || (explicit.lat.is_some() && explicit.lng.is_some()) {
        None
      } else {
        GeoLocator::new(&settings.geolocation_url, Duration::from_secs(10))
          .context("building geolocation client")?
          .locate()
          .await
      };
      let coordinates = geo::overlay(explicit, located);
      let request =
        orch.enrollment_request(signup.email, signup.password, signup.wallet, coordinates)?;
      let session = api(&settings)?.signup(&request).await?;
      print_session(&session);
    }
    Command::Login { email, password } => {
      let session = api(&settings)?.login(&Credentials { email, password }).await?;
      print_session(&session);
    }
    Command::Logout { session } => {
      api(&settings)?.logout(&session).await?;
      println!("logged out");
    }
    Command::Whoami { session } => match api(&settings)?.whoami(&session).await? {
      Some(user) => println!("{} <{}>", user.full_name, user.email),
      None => bail!("not authenticated"),
    },
  }
  Ok(())
}

fn api(settings: &Settings) -> Result<EnrollmentClient> {
  EnrollmentClient::new(ApiConfig {
    base_url:    settings.api_url.clone(),
    cookie_name: settings.cookie_name.clone(),
  })
}

fn print_session(session: &Session) {
  println!("{} <{}>", session.user.full_name, session.user.email);
  println!("session: {}", session.token);
}

/// Run the capture flow once, reporting progress on stderr.
async fn verify(
  settings: &Settings,
  capture: &CaptureArgs,
) -> Result<CaptureOrchestrator<StillImageCamera, HttpVerificationGateway>> {
  let gateway = HttpVerificationGateway::new(&settings.gateway_url, Duration::from_secs(60))
    .context("building gateway client")?;
  let mut orch = CaptureOrchestrator::new(StillImageCamera::new(&capture.face), gateway);

  let mut events = orch.subscribe();

  let document = DocumentFile::read(&capture.document).await?;
  let mut result = orch.select_document(document).await;
  drain(&mut events);
  if result.is_ok() {
    result = orch.capture_and_verify().await.map(|_| ());
    drain(&mut events);
  }

  let outcome = match (result, orch.state()) {
    (Err(e), _) => Err(anyhow!("{}: {e}", orch.status())),
    (Ok(()), VerificationState::Verified(_)) => Ok(()),
    (Ok(()), _) => Err(anyhow!("{}", orch.status())),
  };
  outcome.map(|()| orch)
}

fn drain(events: &mut broadcast::Receiver<CaptureEvent>) {
  while let Ok(event) = events.try_recv() {
    eprintln!("[{}] {}", event.state.name(), event.status);
  }
}
