//! Identity resolution for farmtrace commands.
//!
//! Every command that writes to the ledger needs to know who is acting.
//! Rather than requiring `--as` on every invocation, identity is resolved through a chain:
//!
//! 1. `--as <address>`: explicit per-command override
//! 2. `FARMTRACE_IDENTITY` env var: process/session level
//! 3. `identity` in `~/.farmtrace/config.toml`: default for single-identity users
//!
//! The resolved address is credited as the actor on every record the command writes.

use std::env;

use crate::config::Config;
use crate::model::Address;

/// Error message shown when identity cannot be resolved.
pub const IDENTITY_REQUIRED: &str = "identity required: pass --as <address>, \
    set FARMTRACE_IDENTITY, or add `identity = \"0x...\"` to ~/.farmtrace/config.toml";

const IDENTITY_ENV: &str = "FARMTRACE_IDENTITY";

/// Resolve the acting address from the tiered resolution chain.
///
/// Returns an error with [`IDENTITY_REQUIRED`] when none of the sources yield
/// a value, or a parse error naming the source that held a malformed address.
pub fn resolve_identity(explicit: Option<&str>, config: &Config) -> Result<Address, String> {
    let from_env = env::var(IDENTITY_ENV).ok();
    resolve_from(explicit, from_env.as_deref(), config.identity.as_deref())
}

fn resolve_from(
    explicit: Option<&str>,
    from_env: Option<&str>,
    from_config: Option<&str>,
) -> Result<Address, String> {
    let sources = [
        ("--as", explicit),
        (IDENTITY_ENV, from_env),
        ("config identity", from_config),
    ];

    let Some((source, value)) = sources
        .into_iter()
        .find_map(|(source, value)| value.filter(|v| !v.is_empty()).map(|v| (source, v)))
    else {
        return Err(IDENTITY_REQUIRED.to_string());
    };

    let address: Address = value
        .parse()
        .map_err(|e| format!("invalid address in {source} ({value}): {e}"))?;
    if address.is_zero() {
        return Err(format!("{source} is the zero address, which cannot act"));
    }
    Ok(address)
}
