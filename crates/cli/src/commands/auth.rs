//! Account commands.
//!
//! # Usage
//!
//! ```bash
//! bookshop login -u alice -p 'S3cret!pass'
//! bookshop register -u alice -e alice@example.com -p 'S3cret!pass'
//! ```

use bookshop_storefront::ValidationErrors;
use bookshop_storefront::api::RegisterRequest;
use bookshop_storefront::validation;
use clap::Args;
use secrecy::ExposeSecret;

use super::{CommandError, Context};

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    email: String,

    #[arg(short, long)]
    password: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    phone: Option<String>,
}

/// Sign in and print the bearer token.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, username: &str, password: &str) -> Result<(), CommandError> {
    let mut errors = ValidationErrors::new();
    errors.check("username", validation::required(username, "Username"));
    errors.check("password", validation::required(password, "Password"));
    errors.into_result()?;

    let session = ctx.client.login(username, password).await?;
    tracing::info!(user_id = %session.identity().id, "Signed in");
    println!("{}", session.token().expose_secret());
    Ok(())
}

/// Create an account after validating the fields locally.
#[allow(clippy::print_stdout)]
pub async fn register(ctx: &Context, args: RegisterArgs) -> Result<(), CommandError> {
    let mut errors = ValidationErrors::new();
    errors.check("username", validation::username(&args.username));
    errors.check("email", validation::email(&args.email));
    errors.check("password", validation::password(&args.password));
    if let Some(first_name) = &args.first_name {
        errors.check("firstName", validation::name(first_name, "First name"));
    }
    if let Some(last_name) = &args.last_name {
        errors.check("lastName", validation::name(last_name, "Last name"));
    }
    if let Some(address) = &args.address {
        errors.check("address", validation::address(address));
    }
    if let Some(phone) = &args.phone {
        errors.check("phoneNumber", validation::phone(phone));
    }
    errors.into_result()?;

    let request = RegisterRequest {
        username: args.username.trim().to_string(),
        email: args.email.trim().to_string(),
        password: args.password,
        first_name: args.first_name,
        last_name: args.last_name,
        address: args.address,
        phone_number: args.phone,
    };
    ctx.client.register(&request).await?;
    println!("Account created. You can now sign in as {}.", request.username);
    Ok(())
}
