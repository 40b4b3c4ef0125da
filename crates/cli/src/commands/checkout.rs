//! Checkout command. Drives the wizard end to end in one go.
//!
//! Shipping fields not given on the command line are taken from the stored
//! profile where available.
//!
//! # Usage
//!
//! ```bash
//! bookshop checkout --city Springfield --state IL --zip-code 62704 --payment paypal
//! bookshop checkout ... --payment credit --card "4242 4242 4242 4242" --expiry 12/29 --cvv 123
//! ```

use std::sync::Arc;

use bookshop_core::PaymentMethod;
use bookshop_storefront::api::ShippingInfo;
use bookshop_storefront::checkout::{CardDetails, CheckoutFlow, CheckoutOptions, CheckoutStep};
use clap::Args;

use super::{CommandError, Context, cart};

#[derive(Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    zip_code: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    /// `credit` or `paypal`
    #[arg(long, default_value = "credit")]
    payment: String,

    /// Card number (credit only)
    #[arg(long)]
    card: Option<String>,

    /// Card expiry as MM/YY (credit only)
    #[arg(long)]
    expiry: Option<String>,

    /// Card security code (credit only)
    #[arg(long)]
    cvv: Option<String>,
}

impl CheckoutArgs {
    fn apply_shipping(&self, shipping: &mut ShippingInfo) {
        for (field, value) in [
            (&mut shipping.first_name, &self.first_name),
            (&mut shipping.last_name, &self.last_name),
            (&mut shipping.address, &self.address),
            (&mut shipping.city, &self.city),
            (&mut shipping.state, &self.state),
            (&mut shipping.zip_code, &self.zip_code),
            (&mut shipping.email, &self.email),
            (&mut shipping.phone, &self.phone),
        ] {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
    }
}

#[allow(clippy::print_stdout)]
pub async fn run(ctx: &Context, args: CheckoutArgs) -> Result<(), CommandError> {
    ctx.sign_in().await?;
    let cart = Arc::new(cart::load(ctx).await?);
    let mut flow = CheckoutFlow::start(
        Arc::clone(&cart),
        ctx.client.clone(),
        ctx.session().clone(),
        CheckoutOptions::from(&ctx.config),
    );

    if let Err(e) = flow.prefill_from_profile().await {
        tracing::warn!(error = %e, "Could not pre-fill shipping details");
    }
    args.apply_shipping(flow.shipping_mut());
    flow.set_payment_method(&args.payment)?;
    if flow.draft().payment.method() == PaymentMethod::Credit {
        flow.set_card(CardDetails {
            number: args.card.clone().unwrap_or_default(),
            expiry: args.expiry.clone().unwrap_or_default(),
            cvv: args.cvv.clone().unwrap_or_default(),
        });
    }

    cart::print_cart(&cart.snapshot(), &ctx.config.pricing);
    println!();

    let result = async {
        while flow.step() != CheckoutStep::Confirmation {
            let step = flow.step();
            flow.advance().await?;
            println!("{:<22} ok", step.title());
        }
        Ok::<_, CommandError>(())
    }
    .await;
    cart.shutdown();
    result?;

    if let Some(order_id) = flow.order_id() {
        println!();
        println!("Order #{order_id} placed. Thank you for your purchase!");
    }
    Ok(())
}
