//! Optional trade mirroring.
//!
//! Mirroring is armed only when the feature flag is on and a signing key is
//! present. Order placement is not wired up: an armed mirror validates the
//! key, logs the address it would trade from, and logs each fill it would
//! replicate. No order ever leaves the process.

use std::future::Future;

use anyhow::Context as _;
use k256::ecdsa::SigningKey;
use tracing::{info, warn};

use crate::eth;
use crate::types::TradeEvent;

pub trait MirrorHook: Send + Sync + 'static {
    fn is_armed(&self) -> bool;

    /// Called once per newly-seen fill, after its notification was attempted.
    fn mirror(&self, ev: &TradeEvent) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Identity of the mirror account. Only the derived address is retained.
#[derive(Debug)]
pub struct MirrorSigner {
    address_checksum: String,
}

impl MirrorSigner {
    pub fn from_hex(key: &str) -> anyhow::Result<Self> {
        let pk32 = eth::parse_hex_32(key).context("parse mirror private key")?;
        let signing_key =
            SigningKey::from_bytes((&pk32).into()).context("invalid secp256k1 private key")?;
        Ok(Self {
            address_checksum: eth::checksum_address(&signing_key),
        })
    }

    pub fn address(&self) -> &str {
        &self.address_checksum
    }
}

#[derive(Debug)]
pub enum Mirror {
    Off,
    Armed(MirrorSigner),
}

impl Mirror {
    /// A flag without a key leaves mirroring off (with a warning); a key
    /// without the flag is ignored.
    pub fn from_settings(enabled: bool, key: Option<&str>) -> anyhow::Result<Self> {
        match (enabled, key) {
            (true, Some(key)) => {
                let signer = MirrorSigner::from_hex(key)?;
                info!(mirror_address = %signer.address(), "trade mirroring armed");
                Ok(Mirror::Armed(signer))
            }
            (true, None) => {
                warn!("trade mirroring requested but no signing key is set; mirroring stays off");
                Ok(Mirror::Off)
            }
            (false, _) => Ok(Mirror::Off),
        }
    }
}

impl MirrorHook for Mirror {
    fn is_armed(&self) -> bool {
        matches!(self, Mirror::Armed(_))
    }

    async fn mirror(&self, ev: &TradeEvent) -> anyhow::Result<()> {
        let Mirror::Armed(signer) = self else {
            return Ok(());
        };
        info!(
            from = %signer.address(),
            coin = %ev.asset,
            side = ev.side.as_str(),
            size = ev.size,
            price = ev.price,
            "mirror trade (placeholder, no order sent)"
        );
        Ok(())
    }
}
