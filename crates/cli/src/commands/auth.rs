//! Sign-in commands.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from SHOPFRONT_PASSWORD or --password)
//! shop-cli login -e shopper@example.com
//!
//! # Show the signed-in user
//! shop-cli whoami
//!
//! # Forget the saved token
//! shop-cli logout
//! ```

use secrecy::SecretString;
use shopfront_core::Email;

use super::{CliError, Context};

/// Sign in and persist the token.
pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let password = password
        .filter(|p| !p.is_empty())
        .map(SecretString::from)
        .ok_or(CliError::MissingPassword)?;

    let user = ctx.client.login(&email, &password).await?;
    println!(
        "Signed in as {} ({})",
        user.name.as_deref().unwrap_or("shopper"),
        user.email
    );
    Ok(())
}

/// Drop the saved token.
pub fn logout(ctx: &Context) {
    if ctx.client.logout() {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
}

/// Print the signed-in user.
pub async fn whoami(ctx: &Context) -> Result<(), CliError> {
    let user = ctx.client.current_user().await?;
    println!("{} <{}>", user.name.as_deref().unwrap_or("-"), user.email);
    println!("  id:    {}", user.id);
    if user.is_admin {
        println!("  role:  admin");
    }
    Ok(())
}
