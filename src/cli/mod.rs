//! # CLI Module
//!
//! Command-line front end for the store client, shipped as the `igs` binary.
//!
//! ## Commands
//!
//! ### `endpoints`
//!
//! List the endpoint table, built-in or loaded from an OpenAPI document:
//!
//! ```bash
//! igs endpoints
//! igs endpoints --spec store-openapi.json
//! ```
//!
//! ### `call`
//!
//! Call one operation and print the JSON result. Configuration and
//! credentials come from `IGS_*` environment variables (see
//! [`ClientConfig::from_env`](crate::ClientConfig::from_env)); the call runs in
//! coroutine mode inside a scoped task.
//!
//! ```bash
//! IGS_PROJECT_ID=44056 igs call get_virtual_items -q limit=5 -q locale=en
//! igs call get_virtual_items_sku -p item_sku=big_rocket
//! igs call redeem_coupon --body '{"coupon_code":"WINTER2026"}' --retry-count 3
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use xsolla_igs::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! run_cli(Cli::parse())?;
//! ```

mod commands;

pub use commands::{parse_key_value, run_cli, Cli, Commands};
