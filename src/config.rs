/* src/config.rs */

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ranges::TrustedRanges;
use crate::strategy::{
    Chain, LeftmostNonPrivate, RemoteAddr, RightmostNonPrivate, RightmostTrustedCount,
    RightmostTrustedRange, SingleIpHeader, Strategy,
};

/// Serializable description of a [`Strategy`], for choosing the strategy from a
/// configuration file instead of code.
///
/// ```rust
/// use real_client_ip::{Headers, StrategyConfig};
///
/// let config: StrategyConfig = serde_json::from_str(
///     r#"{"type": "rightmost_trusted_count", "header": "X-Forwarded-For", "trusted_count": 2}"#,
/// )
/// .unwrap();
/// let strategy = config.build().unwrap();
///
/// let headers = Headers::new().with("X-Forwarded-For", "1.1.1.1, 2.2.2.2, 10.0.0.1");
/// assert_eq!(strategy.client_ip(&headers, "").unwrap().to_string(), "2.2.2.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    RemoteAddr,
    SingleIpHeader {
        header: String,
    },
    LeftmostNonPrivate {
        header: String,
    },
    RightmostNonPrivate {
        header: String,
    },
    RightmostTrustedCount {
        header: String,
        trusted_count: usize,
    },
    RightmostTrustedRange {
        header: String,
        #[serde(default)]
        trusted_ranges: Vec<String>,
    },
    Chain {
        strategies: Vec<StrategyConfig>,
    },
}

impl StrategyConfig {
    /// Validate the configuration and construct the strategy it describes.
    ///
    /// Fails with the first invalid setting found, including those of chained
    /// strategies.
    pub fn build(&self) -> Result<Strategy> {
        let strategy = match self {
            Self::RemoteAddr => RemoteAddr.into(),
            Self::SingleIpHeader { header } => SingleIpHeader::new(header)?.into(),
            Self::LeftmostNonPrivate { header } => LeftmostNonPrivate::new(header)?.into(),
            Self::RightmostNonPrivate { header } => RightmostNonPrivate::new(header)?.into(),
            Self::RightmostTrustedCount {
                header,
                trusted_count,
            } => RightmostTrustedCount::new(header, *trusted_count)?.into(),
            Self::RightmostTrustedRange {
                header,
                trusted_ranges,
            } => {
                let ranges = TrustedRanges::parse(trusted_ranges)?;
                RightmostTrustedRange::new(header, ranges)?.into()
            }
            Self::Chain { strategies } => {
                let strategies = strategies
                    .iter()
                    .map(Self::build)
                    .collect::<Result<Vec<_>>>()?;
                Chain::new(strategies).into()
            }
        };
        Ok(strategy)
    }
}

impl TryFrom<&StrategyConfig> for Strategy {
    type Error = crate::error::ConfigError;

    fn try_from(config: &StrategyConfig) -> Result<Self> {
        config.build()
    }
}
