//! Command handlers
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;
use tutorlink_core::models::{RegisterRequest, Role, User};
use tutorlink_core::{ApiClient, ApiError, ApiRequest, Config, CredentialStore, Method};

use crate::cli::{Args, Command};

pub async fn run(args: Args) -> Result<()> {
    let mut config = Config::load()?;
    config.apply_api_url_override(args.api_url);

    let store = Arc::new(CredentialStore::open(config.credential_storage()?)?);
    let api = ApiClient::new(config.gateway_options(), store)?;

    let result = dispatch(&api, &mut config, args.command).await;

    if let Err(ref e) = result {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            if api_error.is_session_expired() {
                eprintln!("Session expired. Run `tutorlink login` to sign in again.");
            }
        }
    }
    result
}

async fn dispatch(api: &ApiClient, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            let user = api.login(&email, &password).await?;
            remember_email(config, &email);
            println!("Signed in as {} ({})", user.display_name(), user.role);
        }

        Command::Register {
            email,
            first_name,
            last_name,
            role,
            phone_number,
        } => {
            let role = Role::parse(&role)
                .filter(|r| *r != Role::Admin)
                .with_context(|| format!("Unsupported role: {}", role))?;
            let password = rpassword::prompt_password("Password: ")?;
            let password_confirm = rpassword::prompt_password("Confirm password: ")?;

            let registration = RegisterRequest {
                email: email.clone(),
                password,
                password_confirm,
                first_name,
                last_name,
                role,
                phone_number,
                date_of_birth: None,
            };
            let user = api.register(&registration).await?;
            remember_email(config, &email);
            println!("Registered {}. Check your email to verify your account.", user.display_name());
        }

        Command::VerifyEmail { uidb64, token } => match api.verify_email(&uidb64, &token).await? {
            Some(user) => println!("Email verified. Signed in as {}", user.display_name()),
            None => println!("Email verified."),
        },

        Command::ResendVerification { email } => {
            api.resend_verification(&email).await?;
            println!("Verification email sent to {}", email);
        }

        Command::Logout => {
            api.logout().await?;
            println!("Signed out");
        }

        Command::Whoami => match api.store().user() {
            Some(user) if api.store().is_authenticated() => print_user(&user),
            _ => println!("Not signed in"),
        },

        Command::Profile => {
            let user = api.profile().await?;
            print_user(&user);
        }

        Command::Refresh => {
            api.refresh().await?;
            println!("Access token refreshed");
        }

        Command::Request { method, path, data } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: serde_json::Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
                request = request.json(&body)?;
            }

            let response = api.gateway().send(&request).await?;
            let text = response.text().await.context("Failed to read response body")?;
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", text),
            }
        }
    }

    Ok(())
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  id:       {}", user.id);
    println!("  role:     {}", user.role);
    println!("  verified: {}", if user.is_email_verified { "yes" } else { "no" });
    if let Some(ref profile) = user.teacher_profile {
        println!("  rate:     {:.2}/h, rating {:.1} ({} reviews)", profile.hourly_rate, profile.average_rating, profile.total_reviews);
    }
    if let Some(ref profile) = user.student_profile {
        if !profile.subjects_interested.is_empty() {
            println!("  subjects: {}", profile.subjects_interested.join(", "));
        }
    }
}
