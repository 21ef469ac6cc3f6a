//! Site Builder CLI - migrations and engine inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sb-cli migrate
//!
//! # List a store's products, filtered
//! sb-cli products list --store 1 --category Shirts --attr color=red,blue --max-price 50
//!
//! # Show a product with its variants
//! sb-cli products show --store 1 --product 42
//!
//! # Add a variant to a session's cart
//! sb-cli cart add --store 1 --session 6a1c...e0 --variant 7 --quantity 2
//!
//! # Merge a session's cart into the customer's after login
//! sb-cli cart merge --store 1 --customer 3 --session 6a1c...e0
//! ```
//!
//! # Commands
//!
//! - `migrate` - Apply database migrations
//! - `categories` - List categories and their attribute definitions
//! - `products` - List, show and create products, resolve variants
//! - `cart` - Show carts, add items, merge on login
//!
//! Results are printed to stdout as JSON; logs go to stderr.
//! Set `LOG_FORMAT=json` for JSON logs and `RUST_LOG` to tune levels.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use sitebuilder_core::SessionId;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sb-cli")]
#[command(author, version, about = "Site builder engine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Inspect categories
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Inspect and write the catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Inspect and change carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List a store's categories
    List {
        #[arg(long)]
        store: i64,
    },
    /// List a category's attribute definitions
    Attributes {
        #[arg(long)]
        store: i64,
        #[arg(long)]
        category: i64,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products matching filters
    List(ListArgs),
    /// Show a product with its variants
    Show {
        #[arg(long)]
        store: i64,
        #[arg(long)]
        product: i64,
    },
    /// Create a product (or reuse an identical one) with its first variant
    Create(CreateArgs),
    /// Resolve an attribute set to a variant, creating or restocking it
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    store: i64,
    /// Category name
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    /// Only products with (or without) stock
    #[arg(long)]
    in_stock: Option<bool>,
    /// Attribute filter as `name=value1,value2`; repeatable
    #[arg(long = "attr")]
    attributes: Vec<String>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
}

/// Variant fields shared by `create` and `resolve`.
#[derive(Args)]
struct VariantArgs {
    /// Attribute value as `attribute_id=value`; repeatable
    #[arg(long = "attr")]
    attributes: Vec<String>,
    #[arg(long)]
    sku: String,
    #[arg(long)]
    price: Decimal,
    /// Units to add to stock
    #[arg(long, default_value_t = 0)]
    stock: i32,
    /// Image file for the variant
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    category: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[command(flatten)]
    variant: VariantArgs,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    product: i64,
    #[command(flatten)]
    variant: VariantArgs,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show a session's cart
    Show {
        #[arg(long)]
        store: i64,
        #[arg(long)]
        session: SessionId,
    },
    /// Add a variant to a session's cart
    Add {
        #[arg(long)]
        store: i64,
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        variant: i64,
        #[arg(long, default_value_t = 1)]
        quantity: i32,
    },
    /// Merge a session's cart into the customer's cart after login
    Merge {
        #[arg(long)]
        store: i64,
        #[arg(long)]
        customer: i64,
        #[arg(long)]
        session: SessionId,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sitebuilder_engine=info,sb_cli=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Categories { action } => match action {
            CategoryAction::List { store } => commands::catalog::list_categories(store).await,
            CategoryAction::Attributes { store, category } => {
                commands::catalog::list_attributes(store, category).await
            }
        },
        Commands::Products { action } => match action {
            ProductAction::List(args) => {
                let request = commands::catalog::ListRequest {
                    store: args.store,
                    category: args.category,
                    brand: args.brand,
                    min_price: args.min_price,
                    max_price: args.max_price,
                    in_stock: args.in_stock,
                    attributes: args.attributes,
                    page: args.page,
                    limit: args.limit,
                };
                commands::catalog::list_products(request).await
            }
            ProductAction::Show { store, product } => {
                commands::catalog::show_product(store, product).await
            }
            ProductAction::Create(args) => {
                let request = commands::catalog::CreateRequest {
                    store: args.store,
                    category: args.category,
                    name: args.name,
                    brand: args.brand,
                    slug: args.slug,
                    description: args.description,
                    variant: args.variant.into(),
                };
                commands::catalog::create_product(request).await
            }
            ProductAction::Resolve(args) => {
                commands::catalog::resolve_variant(args.store, args.product, args.variant.into())
                    .await
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show { store, session } => commands::cart::show(store, session).await,
            CartAction::Add {
                store,
                session,
                variant,
                quantity,
            } => commands::cart::add(store, session, variant, quantity).await,
            CartAction::Merge {
                store,
                customer,
                session,
            } => commands::cart::merge(store, customer, session).await,
        },
    }
}

impl From<VariantArgs> for commands::catalog::VariantRequest {
    fn from(args: VariantArgs) -> Self {
        Self {
            attributes: args.attributes,
            sku: args.sku,
            price: args.price,
            stock: args.stock,
            image: args.image,
        }
    }
}
