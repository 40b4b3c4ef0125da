//! Profile commands.
//!
//! # Usage
//!
//! ```bash
//! bookshop profile show
//! bookshop profile update --address "1 Looking Glass House" --phone 5559876543
//! ```

use bookshop_storefront::ValidationErrors;
use bookshop_storefront::api::{ProfileStore, ProfileUpdate, UserProfile};
use bookshop_storefront::validation;
use clap::Subcommand;

use super::{CommandError, Context};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the stored profile
    Show,
    /// Change the given fields; the rest are left as they are
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },
}

#[allow(clippy::print_stdout)]
pub async fn run(ctx: &Context, action: ProfileAction) -> Result<(), CommandError> {
    let session = ctx.sign_in().await?;

    match action {
        ProfileAction::Show => print_profile(&ctx.client.get_profile(&session).await?),
        ProfileAction::Update {
            first_name,
            last_name,
            email,
            address,
            phone,
        } => {
            let update = ProfileUpdate {
                email: email.map(|s| s.trim().to_string()),
                first_name: first_name.map(|s| s.trim().to_string()),
                last_name: last_name.map(|s| s.trim().to_string()),
                address: address.map(|s| s.trim().to_string()),
                phone_number: phone.map(|s| s.trim().to_string()),
            };
            validate(&update)?;
            if update == ProfileUpdate::default() {
                return Err(CommandError::InvalidInput(
                    "Nothing to update. Pass at least one field.".to_string(),
                ));
            }

            ctx.client.update_profile(&session, &update).await?;
            tracing::info!(user_id = %session.identity().id, "Profile updated");
            println!("Profile updated");
        }
    }
    Ok(())
}

/// Check only the fields being changed.
fn validate(update: &ProfileUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(email) = &update.email {
        errors.check("email", validation::email(email));
    }
    if let Some(first_name) = &update.first_name {
        errors.check("firstName", validation::name(first_name, "First name"));
    }
    if let Some(last_name) = &update.last_name {
        errors.check("lastName", validation::name(last_name, "Last name"));
    }
    if let Some(address) = &update.address {
        errors.check("address", validation::address(address));
    }
    if let Some(phone) = &update.phone_number {
        errors.check("phoneNumber", validation::phone(phone));
    }
    errors.into_result()
}

#[allow(clippy::print_stdout)]
fn print_profile(profile: &UserProfile) {
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("Username: {}", profile.username);
    println!(
        "Name:     {} {}",
        field(&profile.first_name),
        field(&profile.last_name)
    );
    println!("Email:    {}", field(&profile.email));
    println!("Address:  {}", field(&profile.address));
    println!("Phone:    {}", field(&profile.phone_number));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_supplied_fields_are_checked() {
        let update = ProfileUpdate {
            address: Some("1 Looking Glass House".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(validate(&update).is_ok());

        let update = ProfileUpdate {
            phone_number: Some("12".to_string()),
            email: Some("not-an-email".to_string()),
            ..ProfileUpdate::default()
        };
        let errors = validate(&update).unwrap_err();
        assert!(errors.get("phoneNumber").is_some());
        assert!(errors.get("email").is_some());
        assert!(errors.get("address").is_none());
    }
}
