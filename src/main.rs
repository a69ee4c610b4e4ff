#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use launchhub::{
    backend::{FileSessionStore, GoTrueClient},
    models::{AuthData, ProfileUpdate, SocialLinks, UserMetadata},
    session::{SessionManager, SessionManagerConfig, SessionSnapshot},
    settings::LaunchhubSettings,
    validation::{validate_otp_code, LoginForm, SignUpForm},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "launchhub")]
#[command(version)]
#[command(about = "Sign in to ProLaunch Hub and manage your session")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show who is signed in
    Status,
    /// Sign in with e-mail and password
    Login { email: String, password: String },
    /// E-mail a one-time sign-in code
    Otp { email: String },
    /// Verify an e-mailed one-time code
    Verify { email: String, code: String },
    /// Create an account
    Signup {
        email: String,
        password: String,
        full_name: String,
        college: String,
    },
    /// Sign out of the current session
    Logout,
    /// Update profile fields, e.g. `bio="Rust fan" skills=Rust,Go`
    Profile {
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = LaunchhubSettings::load().context("Failed to load settings")?;
    let cli = Cli::parse();

    let store = Arc::new(FileSessionStore::new(&settings.storage.session_file));
    let client = Arc::new(
        GoTrueClient::from_settings(&settings, store)
            .with_context(|| format!("Invalid backend URL {}", settings.backend.url))?,
    );
    let _refresher = settings
        .auto_refresh_interval()
        .map(|tick| client.spawn_auto_refresh(tick));

    let manager =
        SessionManager::start_with_config(client, SessionManagerConfig::from_settings(&settings));
    manager.ready().await;

    let outcome = run(&manager, &settings, cli.command.unwrap_or(Commands::Status)).await;
    print_snapshot(&manager.snapshot());
    manager.shutdown().await;
    outcome
}

async fn run(
    manager: &SessionManager,
    settings: &LaunchhubSettings,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Status => {}
        Commands::Login { email, password } => {
            let form = LoginForm { email, password };
            let email = form.validate_password_login()?;
            manager.sign_in_with_password(&email, &form.password).await?;
            wait_for_session(manager).await;
        }
        Commands::Otp { email } => {
            let form = LoginForm {
                email,
                password: String::new(),
            };
            let email = form.validate_otp_request()?;
            manager.sign_in_with_otp(&email).await?;
            println!("📧 Code sent to {email}; run `launchhub verify {email} <code>`");
        }
        Commands::Verify { email, code } => {
            let form = LoginForm {
                email,
                password: String::new(),
            };
            let email = form.validate_otp_request()?;
            let code = validate_otp_code(&code)?;
            manager.verify_otp(&email, &code).await?;
            wait_for_session(manager).await;
        }
        Commands::Signup {
            email,
            password,
            full_name,
            college,
        } => {
            let form = SignUpForm {
                full_name,
                email,
                college,
                confirm_password: password.clone(),
                password,
            };
            form.validate(settings.auth.min_password_length)?;
            let profile = UserMetadata::for_sign_up(&form.full_name, &form.college);
            let data = manager
                .sign_up(form.email.trim(), &form.password, profile)
                .await?;
            report_sign_up(&data);
        }
        Commands::Logout => {
            manager.sign_out().await?;
            let mut receiver = manager.subscribe();
            let _ = receiver.wait_for(|s| s.session.is_none()).await;
        }
        Commands::Profile { fields } => {
            let update = parse_profile_update(&fields)?;
            let user = manager.update_profile(update).await?;
            println!("✅ Profile updated for {}", user.id);
        }
    }
    Ok(())
}

/// Wait for the pushed sign-in to reach the snapshot
async fn wait_for_session(manager: &SessionManager) {
    let mut receiver = manager.subscribe();
    let _ = receiver.wait_for(|s| s.session.is_some()).await;
}

fn report_sign_up(data: &AuthData) {
    if data.needs_confirmation() {
        println!("📝 Account created. Check your e-mail to confirm it, then log in.");
    } else {
        println!("📝 Account created and signed in.");
    }
}

fn parse_profile_update(fields: &[String]) -> Result<ProfileUpdate> {
    let mut update = ProfileUpdate::new();
    let mut links = SocialLinks::default();

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("Expected KEY=VALUE, got `{field}`");
        };
        let value = value.trim();
        update = match key.trim() {
            "full_name" | "name" => update.full_name(value),
            "college" => update.college(value),
            "bio" => update.bio(value),
            "skills" => update.skills(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty()),
            ),
            "github" => {
                links.github = Some(value.to_string());
                update
            }
            "linkedin" => {
                links.linkedin = Some(value.to_string());
                update
            }
            "portfolio" => {
                links.portfolio = Some(value.to_string());
                update
            }
            other => bail!("Unknown profile field `{other}`"),
        };
    }

    if !links.is_empty() {
        update = update.social_links(links);
    }
    Ok(update)
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let route = launchhub::RootRoute::from_snapshot(snapshot);
    println!("Route: {route}");
    match &snapshot.user {
        Some(user) => {
            let profile = &user.user_metadata;
            let email = user.email.as_deref();
            println!(
                "Signed in as {} <{}> [{}]",
                profile.display_name(email),
                email.unwrap_or("-"),
                profile.initials(email)
            );
            if let Some(college) = &profile.college {
                println!("College: {college}");
            }
            if !profile.skills().is_empty() {
                println!("Skills: {}", profile.skills().join(", "));
            }
        }
        None => println!("Not signed in"),
    }
}
